//! バックグラウンドジョブの状態遷移を報告し、完了したジョブを削除する。

use crate::job;
use crate::signals::SigchldGuard;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Running,
    Stopped,
    Finished,
}

fn matches(filter: Filter, state: job::JobState) -> bool {
    match filter {
        Filter::All => true,
        Filter::Running => state == job::JobState::Running,
        Filter::Stopped => state == job::JobState::Stopped,
        Filter::Finished => state == job::JobState::Finished,
    }
}

/// 生きているバックグラウンドスロットをインデックス順に処理する:
/// コマンド文字列をまずスナップショットし（`jobstate` がジョブを削除
/// し得るため）、状態を問い合わせ、`filter` に合致すれば1行出力する。
pub fn report_with(g: &SigchldGuard, filter: Filter) {
    for idx in job::bg_indices(g) {
        let cmd = job::jobcmd(g, idx);
        let (state, status) = job::jobstate(g, idx);
        if !matches(filter, state) {
            continue;
        }
        match state {
            job::JobState::Finished => {
                let status = status.expect("FINISHED jobstate always yields a status");
                if libc::WIFEXITED(status) {
                    eprintln!("[{}] exited '{}', status={}", idx, cmd, libc::WEXITSTATUS(status));
                } else {
                    eprintln!("[{}] killed '{}' by signal {}", idx, cmd, libc::WTERMSIG(status));
                }
            }
            job::JobState::Running => eprintln!("[{}] running '{}'", idx, cmd),
            job::JobState::Stopped => eprintln!("[{}] suspended '{}'", idx, cmd),
        }
    }
}

/// まだ `SigchldGuard` を持っていない呼び出し元（REPL ループ、`jobs`
/// ビルトイン）向けの、自前でガードを取る入口。
pub fn report(filter: Filter) {
    let g = SigchldGuard::block();
    report_with(&g, filter);
}
