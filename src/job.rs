//! プロセス/ジョブテーブルと、それが保持するレコード群。
//!
//! テーブルは単一の `static` に置く。[`crate::reaper`] の `SIGCHLD`
//! ハンドラは `extern "C"` 関数であり `'static` なデータしか捕捉できない
//! ため、直接そこへ到達させる必要がある。reaper 自身の書き込みを除く
//! すべてのアクセスは `&SigchldGuard` を要求し、これはこのスレッドで
//! `SIGCHLD` がブロックされている間しか存在しない。reaper とガード付き
//! 呼び出し元は互いに排他的（ブロック中は OS が `SIGCHLD` を配送せず、
//! ガードなしにハンドラ以外から書き換える手段もない）なので、同時書き込み
//! は起こり得ない。

use std::cell::UnsafeCell;

use crate::signals::SigchldGuard;

// ── データ構造 ───────────────────────────────────────────────────────

/// フォアグラウンド用に予約されたテーブルインデックス。
pub const FG: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Stopped,
    Finished,
}

/// パイプラインの1ステージに対応する個別プロセス。
pub struct Process {
    pub pid: libc::pid_t,
    pub state: ProcState,
    /// `waitpid` の生ステータス。`state == Finished` になって初めて有効。
    pub status: i32,
}

impl Process {
    fn new(pid: libc::pid_t) -> Self {
        // 実際の wait ステータスが届くまでは -1。それより前に解釈されることはない。
        Process {
            pid,
            state: ProcState::Running,
            status: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

/// 1つのプロセスグループを共有するパイプライン。
pub struct Job {
    pub pgid: libc::pid_t,
    pub procs: Vec<Process>,
    pub tmodes: libc::termios,
    pub command: String,
}

impl Job {
    fn free() -> Self {
        Job {
            pgid: 0,
            procs: Vec::new(),
            tmodes: unsafe { std::mem::zeroed() },
            command: String::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.pgid == 0
    }

    /// 集約状態: いずれかが RUNNING なら RUNNING、そうでなくいずれかが
    /// STOPPED なら STOPPED、それ以外は FINISHED。
    pub fn state(&self) -> JobState {
        if self.procs.iter().any(|p| p.state == ProcState::Running) {
            JobState::Running
        } else if self.procs.iter().any(|p| p.state == ProcState::Stopped) {
            JobState::Stopped
        } else {
            JobState::Finished
        }
    }

    /// 最終ステージの生 wait ステータス。FINISHED になって初めて有効 —
    /// ジョブ全体の終了ステータスは最終ステージの終了で決まる。
    fn last_status(&self) -> i32 {
        self.procs.last().map(|p| p.status).unwrap_or(0)
    }
}

// ── JobTable ─────────────────────────────────────────────────────────

struct TableCell(UnsafeCell<JobTable>);
// SAFETY: アクセスはモジュール冒頭の通り SIGCHLD のマスクで直列化される。
// このプロセスはシグナルハンドラを除けば単一スレッドであり、ハンドラは
// メインスレッドと並行に走るのではなくその場でプリエンプトするだけなので、
// このセルがスレッドをまたいでエイリアスされることはない。
unsafe impl Sync for TableCell {}

static TABLE: TableCell = TableCell(UnsafeCell::new(JobTable { slots: Vec::new() }));

struct JobTable {
    slots: Vec<Job>,
}

fn with_table<R>(f: impl FnOnce(&mut JobTable) -> R) -> R {
    // SAFETY: モジュール冒頭参照。すべての呼び出し元は `SigchldGuard` を
    // 保持している（= ここで SIGCHLD がブロックされている証）か、
    // SIGCHLD ハンドラ自身のどちらか。
    unsafe { f(&mut *TABLE.0.get()) }
}

/// シェル起動時にテーブルを構築する。`signals::install` より前に実行し、
/// 誰とも競合しないようにする。
pub fn init() {
    with_table(|t| {
        t.slots.clear();
        t.slots.push(Job::free());
    });
}

fn find_or_grow_bg_slot(t: &mut JobTable) -> usize {
    match t.slots.iter().skip(1).position(|j| j.is_free()) {
        Some(off) => off + 1,
        None => {
            t.slots.push(Job::free());
            t.slots.len() - 1
        }
    }
}

/// 空いているバックグラウンドスロットを探す（なければテーブルを1つ
/// 伸ばす）。ジョブデータはまだ入れない — 呼び出し元はこの後
/// [`movejob`] で上書きする。停止したフォアグラウンドジョブを
/// バックグラウンドへ降格する際に使う。
pub fn alloc_bg_slot(_g: &SigchldGuard) -> usize {
    with_table(find_or_grow_bg_slot)
}

/// 新しいジョブをフォアグラウンドスロットに、`bg` が立っていれば
/// 最小の空きバックグラウンドスロットに登録する。
pub fn addjob(_g: &SigchldGuard, pgid: libc::pid_t, bg: bool, tmodes: libc::termios) -> usize {
    with_table(|t| {
        let idx = if bg { find_or_grow_bg_slot(t) } else { FG };
        t.slots[idx] = Job {
            pgid,
            procs: Vec::new(),
            tmodes,
            command: String::new(),
        };
        idx
    })
}

/// 登録済みのジョブにもう1ステージ分のプロセスを追加し、表示用の
/// コマンド文字列も伸ばす。
pub fn addproc(_g: &SigchldGuard, idx: usize, pid: libc::pid_t, argv: &[String]) {
    with_table(|t| {
        let job = &mut t.slots[idx];
        if !job.command.is_empty() {
            job.command.push_str(" | ");
        }
        job.command.push_str(&argv.join(" "));
        job.procs.push(Process::new(pid));
    })
}

/// あるスロットから別のスロットへジョブを移す。`to` は空きでなければならない。
pub fn movejob(_g: &SigchldGuard, from: usize, to: usize) {
    with_table(|t| {
        debug_assert!(t.slots[to].is_free());
        t.slots[to] = std::mem::replace(&mut t.slots[from], Job::free());
    })
}

/// 完了したジョブのスロットを解放する。
pub fn deljob(_g: &SigchldGuard, idx: usize) {
    with_table(|t| {
        debug_assert_eq!(t.slots[idx].state(), JobState::Finished);
        t.slots[idx] = Job::free();
    })
}

/// ジョブの集約状態を読む。FINISHED であればジョブを削除し、最終ステージの
/// ステータスを返す。それ以外はそのまま残す。
pub fn jobstate(_g: &SigchldGuard, idx: usize) -> (JobState, Option<i32>) {
    with_table(|t| {
        let state = t.slots[idx].state();
        if state == JobState::Finished && !t.slots[idx].is_free() {
            let status = t.slots[idx].last_status();
            t.slots[idx] = Job::free();
            (JobState::Finished, Some(status))
        } else {
            (state, None)
        }
    })
}

/// ジョブの表示用コマンド文字列。
pub fn jobcmd(_g: &SigchldGuard, idx: usize) -> String {
    with_table(|t| t.slots[idx].command.clone())
}

/// `jobstate` が持つ「FINISHED なら削除する」副作用なしに集約状態だけを
/// 読む。resume や kill-job のように、実際に何かする前に状態を確認しな
/// ければならない呼び出し元が使う。
pub fn state_peek(_g: &SigchldGuard, idx: usize) -> JobState {
    with_table(|t| t.slots[idx].state())
}

/// ジョブ内の STOPPED なプロセスを全て RUNNING とみなす。`SIGCONT` の
/// 送信と、それを裏付ける非同期な `WIFCONTINUED` 通知に先立って呼ぶ。
/// 集約状態はキャッシュされずプロセス状態から都度導出されるため必要になる。
pub fn mark_running(_g: &SigchldGuard, idx: usize) {
    with_table(|t| {
        for p in &mut t.slots[idx].procs {
            if p.state == ProcState::Stopped {
                p.state = ProcState::Running;
            }
        }
    })
}

pub fn pgid(_g: &SigchldGuard, idx: usize) -> libc::pid_t {
    with_table(|t| t.slots[idx].pgid)
}

pub fn tmodes(_g: &SigchldGuard, idx: usize) -> libc::termios {
    with_table(|t| t.slots[idx].tmodes)
}

pub fn is_free(_g: &SigchldGuard, idx: usize) -> bool {
    with_table(|t| t.slots[idx].is_free())
}

pub fn len(_g: &SigchldGuard) -> usize {
    with_table(|t| t.slots.len())
}

/// 未完了かつ空きでないバックグラウンドスロットのうち最大のインデックス
/// — 明示的なジョブ番号を指定しない `resume` が選ぶもの。
pub fn highest_resumable(_g: &SigchldGuard) -> Option<usize> {
    with_table(|t| {
        (1..t.slots.len())
            .rev()
            .find(|&j| !t.slots[j].is_free() && t.slots[j].state() != JobState::Finished)
    })
}

/// テーブル順のバックグラウンドスロット一覧。reporter が使う。
pub fn bg_indices(_g: &SigchldGuard) -> Vec<usize> {
    with_table(|t| (1..t.slots.len()).filter(|&j| !t.slots[j].is_free()).collect())
}

/// 呼び出すのは本物の `SIGCHLD` ハンドラのみ。実行中は唯一の書き込み主体
/// なので `SigchldGuard` のトークンを経由しない。
pub(crate) fn reap_mark(pid: libc::pid_t, raw_status: i32) {
    with_table(|t| {
        for job in &mut t.slots {
            if job.is_free() {
                continue;
            }
            for proc in &mut job.procs {
                if proc.pid == pid {
                    proc.status = -1;
                    if libc::WIFEXITED(raw_status) || libc::WIFSIGNALED(raw_status) {
                        proc.state = ProcState::Finished;
                        proc.status = raw_status;
                    } else if libc::WIFCONTINUED(raw_status) {
                        proc.state = ProcState::Running;
                    } else if libc::WIFSTOPPED(raw_status) {
                        proc.state = ProcState::Stopped;
                    }
                    return;
                }
            }
        }
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // 純粋な状態機械部分を `reap_mark`/`with_table` 経由で直接検証する。
    // テストはシングルスレッドで動き、実際の SIGCHLD が保留中になること
    // もないので、ここでは生の `SigchldGuard` なしでも安全。

    fn reset() {
        with_table(|t| t.slots = vec![Job::free()]);
    }

    #[test]
    fn aggregate_state_prefers_running_then_stopped_then_finished() {
        reset();
        with_table(|t| {
            t.slots.push(Job {
                pgid: 100,
                procs: vec![
                    Process {
                        pid: 101,
                        state: ProcState::Finished,
                        status: 0,
                    },
                    Process {
                        pid: 102,
                        state: ProcState::Running,
                        status: -1,
                    },
                ],
                tmodes: unsafe { std::mem::zeroed() },
                command: "a | b".into(),
            });
        });
        let state = with_table(|t| t.slots[1].state());
        assert_eq!(state, JobState::Running);

        with_table(|t| t.slots[1].procs[1].state = ProcState::Stopped);
        let state = with_table(|t| t.slots[1].state());
        assert_eq!(state, JobState::Stopped);

        with_table(|t| t.slots[1].procs[1].state = ProcState::Finished);
        let state = with_table(|t| t.slots[1].state());
        assert_eq!(state, JobState::Finished);
    }

    #[test]
    fn free_slot_is_all_default() {
        reset();
        let job = with_table(|t| std::mem::replace(&mut t.slots[0], Job::free()));
        assert!(job.is_free());
        assert!(job.procs.is_empty());
        assert!(job.command.is_empty());
    }

    #[test]
    fn reap_mark_updates_matching_pid_only() {
        reset();
        with_table(|t| {
            t.slots.push(Job {
                pgid: 200,
                procs: vec![Process::new(201), Process::new(202)],
                tmodes: unsafe { std::mem::zeroed() },
                command: "sleep 1 | sleep 2".into(),
            });
        });

        // Linux では正常終了・ステータス0の wait ステータスは全ビット0の
        // ワードになる。フォークせずその値を直接合成してテストする。
        reap_mark(201, 0);

        with_table(|t| {
            assert_eq!(t.slots[1].procs[0].state, ProcState::Finished);
            assert_eq!(t.slots[1].procs[1].state, ProcState::Running);
        });
        assert_eq!(with_table(|t| t.slots[1].state()), JobState::Running);

        reap_mark(202, 0);
        assert_eq!(with_table(|t| t.slots[1].state()), JobState::Finished);
    }

    #[test]
    fn addjob_bg_reuses_lowest_free_index() {
        reset();
        let g = SigchldGuard::block();
        let j1 = addjob(&g, 10, true, unsafe { std::mem::zeroed() });
        let j2 = addjob(&g, 20, true, unsafe { std::mem::zeroed() });
        assert_eq!(j1, 1);
        assert_eq!(j2, 2);
        // プロセスが1つもないジョブは自明に FINISHED なので、実際の reap
        // なしでも deljob の事前条件を満たせる。
        deljob(&g, j1);
        let j3 = addjob(&g, 30, true, unsafe { std::mem::zeroed() });
        assert_eq!(j3, 1);
    }

    #[test]
    fn addproc_joins_stages_with_pipe_separator() {
        reset();
        let g = SigchldGuard::block();
        let idx = addjob(&g, 10, true, unsafe { std::mem::zeroed() });
        addproc(&g, idx, 11, &["cat".to_string(), "file".to_string()]);
        addproc(
            &g,
            idx,
            12,
            &["tr".to_string(), "a-z".to_string(), "A-Z".to_string()],
        );
        assert_eq!(jobcmd(&g, idx), "cat file | tr a-z A-Z");
    }
}
