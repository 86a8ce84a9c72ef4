//! jcsh — 対話的なジョブ制御シェル。
//!
//! REPL ループ: プロンプトを表示し、生の `read(2)`（EINTR に敏感 —
//! Ctrl-C がブロック中の読み取りを実際に中断できるよう、自動再開させ
//! ない）で1行読み、トークナイズし、起動し、バックグラウンドの状態
//! 変化を報告して、また先頭へ戻る。

use std::ffi::c_void;
use std::io::{self, Write};

use jcsh::job;
use jcsh::pipeline;
use jcsh::reporter::{self, Filter};
use jcsh::shell::Shell;
use jcsh::shutdown;
use jcsh::signals;
use jcsh::terminal::Terminal;
use jcsh::token::{self, Token};

const PROMPT: &str = "# ";
const LINE_BUF: usize = 4096;

/// EOF なら `None`。`SIGINT` に中断された読み取りは、エラーではなく
/// キャンセルされた行として `Some("")` を返す。
fn readline(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();

    let mut buf = [0u8; LINE_BUF];
    let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr() as *mut c_void, buf.len()) };

    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            eprintln!("jcsh: read error: {}", err);
        }
        println!();
        return Some(String::new());
    }
    if n == 0 {
        return None;
    }

    let mut line = String::from_utf8_lossy(&buf[..n as usize]).into_owned();
    if line.ends_with('\n') {
        line.pop();
    }
    Some(line)
}

fn main() {
    let terminal = match Terminal::init() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    job::init();

    if let Err(e) = signals::install() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let mut shell = Shell::new(terminal);

    loop {
        let line = match readline(PROMPT) {
            Some(l) => l,
            None => break,
        };

        if !line.trim().is_empty() {
            let mut tokens = token::tokenize(&line);
            let bg = matches!(tokens.last(), Some(Token::Background));
            if bg {
                tokens.pop();
            }

            match pipeline::launch(&mut shell, &tokens, bg) {
                Ok(status) => shell.last_status = status,
                Err(e) => eprintln!("{}", e),
            }
        }

        reporter::report(Filter::Finished);

        if shell.should_exit {
            break;
        }
    }

    println!();
    shutdown::shutdown(&mut shell);

    // `process::exit` はデストラクタを走らせないので、端末ディスクリプタ
    // は先に明示的にドロップして、プロセス終了前に閉じさせる。
    let status = shell.last_status;
    drop(shell);
    std::process::exit(status);
}
