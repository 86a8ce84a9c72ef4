//! フォアグラウンドジョブの監視。
//!
//! シグナルサスペンドでブロックし、フォアグラウンドジョブが RUNNING を
//! 抜けるまで待つ。STOPPED ならバックグラウンドへ降格する。戻る前に
//! 必ず端末の所有権をシェルへ戻す。

use crate::job;
use crate::shell::Shell;
use crate::signals::SigchldGuard;

/// 事前条件: FG スロットに RUNNING なジョブが入っていること。`g` は
/// このスレッドで `SIGCHLD` がブロックされていることの証明。
pub fn monitor_foreground(shell: &mut Shell, g: &SigchldGuard) -> i32 {
    let pgid = job::pgid(g, job::FG);
    shell.terminal.acquire(pgid);

    let (final_state, status) = loop {
        let (state, status) = job::jobstate(g, job::FG);
        if state != job::JobState::Running {
            break (state, status);
        }
        // SIGCHLD のブロックをアトミックに解除して配送を待つ。reaper
        // （本物の SIGCHLD ハンドラ）がこの呼び出しが返るまでに状態を
        // 更新している。
        g.suspend();
    };

    let exit_status = match final_state {
        job::JobState::Stopped => {
            let new_idx = job::alloc_bg_slot(g);
            job::movejob(g, job::FG, new_idx);
            0
        }
        job::JobState::Finished => {
            let status = status.expect("FINISHED jobstate always yields a status");
            if libc::WIFEXITED(status) {
                libc::WEXITSTATUS(status)
            } else if libc::WIFSIGNALED(status) {
                128 + libc::WTERMSIG(status)
            } else {
                1
            }
        }
        job::JobState::Running => unreachable!("loop only exits on non-RUNNING state"),
    };

    shell.terminal.restore_shell();
    exit_status
}
