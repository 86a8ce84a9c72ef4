//! シャットダウンシーケンサ。シェルプロセスが終了する前に、テーブルに
//! 残っている全ジョブを1つずつ停止させる。端末が消えた後にバックグラウンド
//! で動き続けるものが残らないようにするため。

use crate::job;
use crate::reporter::{self, Filter};
use crate::shell::Shell;
use crate::signals::SigchldGuard;

pub fn shutdown(shell: &mut Shell) {
    let g = SigchldGuard::block();

    for idx in 0..job::len(&g) {
        if job::is_free(&g, idx) || job::state_peek(&g, idx) == job::JobState::Finished {
            continue;
        }

        let pgid = job::pgid(&g, idx);
        if idx != job::FG {
            shell.terminal.acquire(pgid);
        }

        unsafe {
            libc::kill(-pgid, libc::SIGTERM);
            if job::state_peek(&g, idx) == job::JobState::Stopped {
                libc::kill(-pgid, libc::SIGCONT);
            }
        }

        while job::state_peek(&g, idx) != job::JobState::Finished {
            g.suspend();
        }

        if idx != job::FG {
            shell.terminal.restore_shell();
        }
    }

    reporter::report_with(&g, Filter::Finished);
}
