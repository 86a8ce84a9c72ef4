//! スキャン済みのコマンドラインを実際のプロセスに変換する。
//!
//! リダイレクトとパイプの fd 配線、プロセスグループの確立、ジョブテーブルへの
//! 登録までを一手に引き受け、最後はフォアグラウンドモニタに託すか、
//! バックグラウンドとして起動を通知する。

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::ptr;

use crate::builtins;
use crate::error::ShellError;
use crate::exec;
use crate::job;
use crate::monitor;
use crate::shell::Shell;
use crate::signals::SigchldGuard;
use crate::token::Token;

// ── ステージ ──────────────────────────────────────────────────────

/// パイプラインの1ステージ分。パイプ演算子は既に取り除かれ、自身の
/// `<`/`>` ターゲットだけを保持する。
struct Stage {
    argv: Vec<String>,
    input: Option<String>,
    output: Option<String>,
}

fn next_word(tokens: &[Token], idx: usize) -> Result<String, ShellError> {
    match tokens.get(idx) {
        Some(Token::Word(w)) => Ok(w.clone()),
        _ => Err(ShellError::Malformed(
            "expected a filename after a redirection".into(),
        )),
    }
}

/// 1ステージ分のトークン列から `<`/`>` と対応ファイル名を取り除き、
/// 残った単語を argv として組み立てる。
fn scan_stage(tokens: &[Token]) -> Result<Stage, ShellError> {
    let mut argv = Vec::new();
    let mut input = None;
    let mut output = None;

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(w) => {
                argv.push(w.clone());
                i += 1;
            }
            Token::Input => {
                input = Some(next_word(tokens, i + 1)?);
                i += 2;
            }
            Token::Output => {
                output = Some(next_word(tokens, i + 1)?);
                i += 2;
            }
            Token::Pipe | Token::Background => {
                unreachable!("caller splits on Pipe and strips Background first")
            }
        }
    }

    if argv.is_empty() {
        return Err(ShellError::Malformed("empty command".into()));
    }
    Ok(Stage {
        argv,
        input,
        output,
    })
}

fn split_stages(tokens: &[Token]) -> Vec<Vec<Token>> {
    tokens
        .split(|t| *t == Token::Pipe)
        .map(|s| s.to_vec())
        .collect()
}

pub fn is_pipeline(tokens: &[Token]) -> bool {
    tokens.iter().any(|t| *t == Token::Pipe)
}

// ── リダイレクト ──────────────────────────────────────────────────

/// 出力先は `S_IRWXU`（ユーザに実行権限まで付与）で作成する。原典の
/// `do_redir` に合わせており、`O_TRUNC` は使わない（原典にもない）。
fn open_redirect(path: &str, write: bool) -> Result<RawFd, ShellError> {
    let cpath = CString::new(path).map_err(|_| ShellError::Malformed("bad filename".into()))?;
    let fd = unsafe {
        if write {
            libc::open(cpath.as_ptr(), libc::O_WRONLY | libc::O_CREAT, 0o700)
        } else {
            libc::open(cpath.as_ptr(), libc::O_RDONLY)
        }
    };
    if fd < 0 {
        return Err(ShellError::errno("open"));
    }
    Ok(fd)
}

fn apply_redirections(stage: &Stage) -> Result<(Option<RawFd>, Option<RawFd>), ShellError> {
    let input = match stage.input.as_deref() {
        Some(p) => Some(open_redirect(p, false)?),
        None => None,
    };
    let output = match stage.output.as_deref() {
        Some(p) => match open_redirect(p, true) {
            Ok(fd) => Some(fd),
            Err(e) => {
                // 入力側は開けているので、ここで失敗しても漏らさず閉じる。
                if let Some(fd) = input {
                    unsafe {
                        libc::close(fd);
                    }
                }
                return Err(e);
            }
        },
        None => None,
    };
    Ok((input, output))
}

fn mkpipe() -> Result<(RawFd, RawFd), ShellError> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(ShellError::errno("pipe"));
    }
    for fd in fds {
        unsafe {
            libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

// ── 子プロセス共通処理 ────────────────────────────────────────────

/// フォークした子がシェルから継承すべきでないシグナル設定を復元し、
/// 対象のプロセスグループに加わる（`pgid_target == 0` は「自分の pid を
/// リーダーとする新しいグループを作れ」の意味で、パイプラインの先頭
/// ステージが使う）。子が実際に属したグループ id を返す。
fn child_setup_common(pgid_target: libc::pid_t, bg: bool, pre_block_mask: &libc::sigset_t) -> libc::pid_t {
    unsafe {
        libc::sigprocmask(libc::SIG_SETMASK, pre_block_mask, ptr::null_mut());
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        if bg {
            libc::signal(libc::SIGTTIN, libc::SIG_DFL);
            libc::signal(libc::SIGTTOU, libc::SIG_DFL);
        }
        let mypid = libc::getpid();
        let pgid = if pgid_target == 0 { mypid } else { pgid_target };
        libc::setpgid(0, pgid);
        pgid
    }
}

fn apply_redirection_fds(input_fd: Option<RawFd>, output_fd: Option<RawFd>) {
    unsafe {
        if let Some(fd) = input_fd {
            libc::dup2(fd, libc::STDIN_FILENO);
            libc::close(fd);
        }
        if let Some(fd) = output_fd {
            libc::dup2(fd, libc::STDOUT_FILENO);
            libc::close(fd);
        }
    }
}

/// ビルトインとして試し、だめなら外部コマンドに fall back する。戻らない。
/// フォーク後の子プロセス内からしか呼ばれない。
fn exec_or_exit(shell: &mut Shell, argv: &[String]) -> ! {
    if let Some(code) = builtins::try_builtin(shell, argv) {
        std::process::exit(code);
    }
    let err = exec::exec_external(argv);
    eprintln!("{}", err);
    std::process::exit(err.exit_status());
}

// ── 起動 ──────────────────────────────────────────────────────────

/// スキャン済み・`&`除去済みのコマンドラインを単一コマンド経路か
/// 複数ステージ経路へ振り分ける。
pub fn launch(shell: &mut Shell, tokens: &[Token], bg: bool) -> Result<i32, ShellError> {
    if tokens.is_empty() {
        return Ok(shell.last_status);
    }
    if is_pipeline(tokens) {
        launch_pipeline(shell, tokens, bg)
    } else {
        launch_single(shell, tokens, bg)
    }
}

/// パイプを含まない単発コマンド。フォアグラウンドのビルトインはシェル
/// 自身のプロセス内で直接試す（`cd`/`exit`/`export` が実際に効くように
/// するため、リダイレクトは一切介さない）。パイプラインの1ステージや
/// バックグラウンドのビルトインは必ずサブプロセスとして動くので、その
/// ビルトイン判定はフォーク後、[`exec_or_exit`] の中で行う。
fn launch_single(shell: &mut Shell, tokens: &[Token], bg: bool) -> Result<i32, ShellError> {
    let stage = scan_stage(tokens)?;

    if !bg {
        if let Some(code) = builtins::try_builtin(shell, &stage.argv) {
            return Ok(code);
        }
    }

    let g = SigchldGuard::block();
    let (input_fd, output_fd) = apply_redirections(&stage)?;

    match unsafe { libc::fork() } {
        0 => {
            let pgid = child_setup_common(0, bg, g.pre_block_mask());
            if !bg {
                unsafe {
                    libc::tcsetpgrp(shell.terminal.fd(), pgid);
                }
            }
            apply_redirection_fds(input_fd, output_fd);
            exec_or_exit(shell, &stage.argv);
        }
        pid if pid > 0 => {
            unsafe {
                libc::setpgid(pid, pid);
            }
            unsafe {
                if let Some(fd) = input_fd {
                    libc::close(fd);
                }
                if let Some(fd) = output_fd {
                    libc::close(fd);
                }
            }

            let idx = job::addjob(&g, pid, bg, shell.terminal.shell_tmodes());
            job::addproc(&g, idx, pid, &stage.argv);

            if bg {
                eprintln!("[{}] running '{}'", idx, job::jobcmd(&g, idx));
                Ok(shell.last_status)
            } else {
                Ok(monitor::monitor_foreground(shell, &g))
            }
        }
        _ => Err(ShellError::errno("fork")),
    }
}

/// `|` で繋がれた2つ以上のステージ。全ステージが先頭ステージの
/// プロセスグループに入る。隣接ステージ間は双方向パイプで結び、
/// 必要な側の子がフォークし終えた時点でシェル側の複製 fd を閉じる。
fn launch_pipeline(shell: &mut Shell, tokens: &[Token], bg: bool) -> Result<i32, ShellError> {
    let groups = split_stages(tokens);
    let stages: Vec<Stage> = groups
        .iter()
        .map(|g| scan_stage(g))
        .collect::<Result<_, _>>()?;

    let g = SigchldGuard::block();

    let mut pgid: libc::pid_t = 0;
    let mut job_idx: Option<usize> = None;
    let mut prev_read_fd: Option<RawFd> = None;
    let n = stages.len();

    for (i, stage) in stages.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == n - 1;

        // 中間ステージ自身の `<`/`>` は、どのみちその側のパイプに
        // 覆われてしまうので、効果を持ち得る側でしか開かない。
        let explicit_in = if is_first {
            stage
                .input
                .as_deref()
                .map(|p| open_redirect(p, false))
                .transpose()?
        } else {
            None
        };
        let explicit_out = if is_last {
            stage
                .output
                .as_deref()
                .map(|p| open_redirect(p, true))
                .transpose()?
        } else {
            None
        };

        let input_fd = if is_first { explicit_in } else { prev_read_fd };
        let (output_fd, next_read_fd) = if is_last {
            (explicit_out, None)
        } else {
            let (read_end, write_end) = mkpipe()?;
            (Some(write_end), Some(read_end))
        };

        match unsafe { libc::fork() } {
            0 => {
                child_setup_common(pgid, bg, g.pre_block_mask());
                if let Some(fd) = next_read_fd {
                    unsafe {
                        libc::close(fd);
                    }
                }
                apply_redirection_fds(input_fd, output_fd);
                exec_or_exit(shell, &stage.argv);
            }
            pid if pid > 0 => {
                if is_first {
                    pgid = pid;
                }
                unsafe {
                    libc::setpgid(pid, pgid);
                }
                unsafe {
                    if let Some(fd) = input_fd {
                        libc::close(fd);
                    }
                    if let Some(fd) = output_fd {
                        libc::close(fd);
                    }
                }

                if is_first {
                    job_idx = Some(job::addjob(&g, pgid, bg, shell.terminal.shell_tmodes()));
                }
                job::addproc(&g, job_idx.expect("first stage registers the job"), pid, &stage.argv);
                prev_read_fd = next_read_fd;
            }
            _ => return Err(ShellError::errno("fork")),
        }
    }

    let idx = job_idx.expect("a pipeline always has at least one stage");
    if bg {
        eprintln!("[{}] running '{}'", idx, job::jobcmd(&g, idx));
        Ok(shell.last_status)
    } else {
        Ok(monitor::monitor_foreground(shell, &g))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_stage_separates_redirections_from_words() {
        let tokens = vec![
            Token::Word("cat".into()),
            Token::Input,
            Token::Word("in.txt".into()),
            Token::Output,
            Token::Word("out.txt".into()),
        ];
        let stage = scan_stage(&tokens).unwrap();
        assert_eq!(stage.argv, vec!["cat".to_string()]);
        assert_eq!(stage.input.as_deref(), Some("in.txt"));
        assert_eq!(stage.output.as_deref(), Some("out.txt"));
    }

    #[test]
    fn scan_stage_rejects_dangling_redirection() {
        let tokens = vec![Token::Word("cat".into()), Token::Input];
        assert!(scan_stage(&tokens).is_err());
    }

    #[test]
    fn scan_stage_rejects_empty_command() {
        assert!(scan_stage(&[]).is_err());
    }

    #[test]
    fn split_stages_splits_on_pipe() {
        let tokens = vec![
            Token::Word("cat".into()),
            Token::Word("file".into()),
            Token::Pipe,
            Token::Word("tr".into()),
            Token::Word("a-z".into()),
            Token::Word("A-Z".into()),
        ];
        let groups = split_stages(&tokens);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 3);
    }

    #[test]
    fn is_pipeline_detects_pipe_token() {
        assert!(!is_pipeline(&[Token::Word("ls".into())]));
        assert!(is_pipeline(&[
            Token::Word("ls".into()),
            Token::Pipe,
            Token::Word("wc".into())
        ]));
    }
}
