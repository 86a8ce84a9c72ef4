//! `fg`/`bg` による再開と `kill` によるジョブ制御操作。

use crate::job;
use crate::monitor;
use crate::shell::Shell;
use crate::signals::SigchldGuard;

/// `resume(idx, bg)`。`idx = None` なら未完了の最大インデックスを選ぶ。
/// 該当ジョブがない、あるいは既に完了していれば `false` を返す。
pub fn resume(shell: &mut Shell, idx: Option<usize>, bg: bool) -> bool {
    let g = SigchldGuard::block();

    let idx = match idx.or_else(|| job::highest_resumable(&g)) {
        Some(i) => i,
        None => return false,
    };
    if job::is_free(&g, idx) || job::state_peek(&g, idx) == job::JobState::Finished {
        return false;
    }

    job::mark_running(&g, idx);
    let pgid = job::pgid(&g, idx);

    if bg {
        unsafe {
            libc::kill(-pgid, libc::SIGCONT);
        }
        eprintln!("[{}] continue '{}'", idx, job::jobcmd(&g, idx));
    } else {
        debug_assert!(job::is_free(&g, job::FG));
        shell.terminal.acquire(pgid);
        // 再開前にシェル自身の端末モードを一旦適用し、再開されるジョブが
        // それを引き継げるようにする。
        shell.terminal.set_attrs(&shell.terminal.shell_tmodes());
        job::movejob(&g, idx, job::FG);
        unsafe {
            libc::kill(-pgid, libc::SIGCONT);
        }
        eprintln!("[{}] continue '{}'", job::FG, job::jobcmd(&g, job::FG));
        shell.last_status = monitor::monitor_foreground(shell, &g);
    }

    true
}

/// `killjob(idx)`: ジョブのプロセスグループに `SIGTERM` を送る。停止中
/// なら、その終了を観測できるよう追加で `SIGCONT` も送る。
pub fn kill_job(idx: usize) -> bool {
    let g = SigchldGuard::block();

    if job::is_free(&g, idx) || job::state_peek(&g, idx) == job::JobState::Finished {
        return false;
    }

    let pgid = job::pgid(&g, idx);
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }
    if job::state_peek(&g, idx) == job::JobState::Stopped {
        unsafe {
            libc::kill(-pgid, libc::SIGCONT);
        }
    }
    true
}
