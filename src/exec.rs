//! 外部コマンドランチャ。`execvp` でプロセスイメージを置き換える。
//! フォーク後にしか呼ばれないので、成功時は戻らない。失敗時だけ戻り、
//! 呼び出し側がエラーを報告して適切な終了コードで終わる。

use std::ffi::CString;
use std::fmt;

pub struct ExecError {
    pub errno: i32,
    pub command: String,
}

impl ExecError {
    fn message(&self) -> &'static str {
        match self.errno {
            libc::ENOENT => "command not found",
            libc::EACCES => "permission denied",
            _ => "exec failed",
        }
    }

    /// 127 = command not found、126 = permission denied。失敗した exec に
    /// 対するシェルの慣習的な終了コード。
    pub fn exit_status(&self) -> i32 {
        match self.errno {
            libc::ENOENT => 127,
            libc::EACCES => 126,
            _ => 1,
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jcsh: {}: {}", self.command, self.message())
    }
}

/// `PATH` から `argv[0]` を探して `argv` で exec する。成功時は戻らない。
pub fn exec_external(argv: &[String]) -> ExecError {
    let cstrings: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let mut ptrs: Vec<*const libc::c_char> = cstrings.iter().map(|s| s.as_ptr()).collect();
    ptrs.push(std::ptr::null());

    unsafe {
        libc::execvp(ptrs[0], ptrs.as_ptr());
    }

    ExecError {
        errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
        command: argv.first().cloned().unwrap_or_default(),
    }
}
