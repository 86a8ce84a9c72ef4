//! シェル共通のエラー型。
//!
//! 端末のセットアップ、`fork`/`pipe`/`dup2`、リダイレクト対象のオープン
//! といった、シェルの内務作業中に起きるシステムコール失敗をまとめる。
//! コマンドラインの構文不備は別枠（`Malformed`）で、シェル全体を落とす
//! のではなく現在行を捨てるだけの非致命的なケースとして扱う。

use std::fmt;
use std::io;

/// シェルの内務作業中（フォークした子の中ではない — そちらは終了
/// ステータスで報告する）に失敗したシステムコール。
#[derive(Debug)]
pub enum ShellError {
    /// `syscall` はエラーメッセージ用の呼び出し名、`errno` は失敗直後に
    /// 捕まえた生の `errno` 値。
    Errno { syscall: &'static str, errno: i32 },
    /// 標準入力が制御端末ではない。
    NotATerminal,
    /// 構文が不備なコマンドライン: 空のパイプラインステージ、リダイレクト
    /// 記号の後にファイル名がない、など。
    Malformed(String),
}

impl ShellError {
    pub fn errno(syscall: &'static str) -> Self {
        ShellError::Errno {
            syscall,
            errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Errno { syscall, errno } => {
                let msg = io::Error::from_raw_os_error(*errno);
                write!(f, "jcsh: {}: {}", syscall, msg)
            }
            ShellError::NotATerminal => {
                write!(f, "jcsh: can only run in interactive mode")
            }
            ShellError::Malformed(msg) => write!(f, "jcsh: {}", msg),
        }
    }
}

impl std::error::Error for ShellError {}
