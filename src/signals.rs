//! シェルのシグナル設定をインストールし、[`SigchldGuard`] を公開する。
//! `SIGCHLD` ハンドラの外でジョブテーブルを操作するコードは全てこの
//! 能力トークンを保持しなければならない。ガードの構築は `SIGCHLD` を
//! ブロックし、破棄されれば元のマスクへ戻す。「ジョブテーブル操作には
//! 子プロセス状態シグナルのブロックが必要」という規約を、呼び出し側が
//! 覚えておくものから型検査器が強制するものへ変える。

use std::mem::MaybeUninit;
use std::ptr;

use crate::error::ShellError;
use crate::reaper::sigchld_handler;

fn child_signal_mask() -> libc::sigset_t {
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGCHLD);
        set.assume_init()
    }
}

// ── インストール ──────────────────────────────────────────────────

/// シェルのシグナル設定をインストールする:
/// - `SIGCHLD`: 自動再開あり。ハンドラ実行中は `SIGINT` も追加でブロック
///   し、`sigint_handler` がreap処理の途中に割り込めないようにする。
/// - `SIGINT`: 自動再開なしの no-op ハンドラ。プロンプト読み取り中の
///   `read()` をきれいに中断させるため。
/// - `SIGTSTP`/`SIGTTIN`/`SIGTTOU`: シェル自身では無視する。子プロセス
///   は exec 前に `SIG_DFL` へ戻す。
pub fn install() -> Result<(), ShellError> {
    unsafe {
        let mut chld_act: libc::sigaction = std::mem::zeroed();
        chld_act.sa_sigaction = sigchld_handler as usize;
        chld_act.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut chld_act.sa_mask);
        libc::sigaddset(&mut chld_act.sa_mask, libc::SIGINT);
        if libc::sigaction(libc::SIGCHLD, &chld_act, ptr::null_mut()) < 0 {
            return Err(ShellError::errno("sigaction"));
        }

        let mut int_act: libc::sigaction = std::mem::zeroed();
        int_act.sa_sigaction = sigint_handler as usize;
        int_act.sa_flags = 0;
        libc::sigemptyset(&mut int_act.sa_mask);
        if libc::sigaction(libc::SIGINT, &int_act, ptr::null_mut()) < 0 {
            return Err(ShellError::errno("sigaction"));
        }

        for sig in [libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU] {
            if libc::signal(sig, libc::SIG_IGN) == libc::SIG_ERR {
                return Err(ShellError::errno("signal"));
            }
        }
    }
    Ok(())
}

/// no-op ハンドラ。目的はただ一つ、`read()` を再開させず `EINTR` で
/// 失敗させることで、Ctrl-C がブロック中のプロンプト読み取りを破ること。
extern "C" fn sigint_handler(_sig: libc::c_int) {}

// ── SigchldGuard ─────────────────────────────────────────────────

/// 「このスレッドで `SIGCHLD` がブロックされている」ことの証明。
/// ジョブテーブル操作は `&SigchldGuard` を取るので、先にシグナルを
/// ブロックしていない呼び出し元は到達できない。
pub struct SigchldGuard {
    old_mask: libc::sigset_t,
}

impl SigchldGuard {
    /// `SIGCHLD` をブロックし、元のマスクを覚えておく。`Drop` での復元と
    /// [`SigchldGuard::suspend`] での一時的な再適用の両方に使う。
    pub fn block() -> Self {
        let mask = child_signal_mask();
        let mut old = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            libc::sigprocmask(libc::SIG_BLOCK, &mask, old.as_mut_ptr());
        }
        Self {
            old_mask: unsafe { old.assume_init() },
        }
    }

    /// ブロック前のマスクへアトミックに戻しつつ、ブロックされていない
    /// 何らかのシグナルが配送されるまで待つ。これが返る時点で、本物の
    /// `SIGCHLD` ハンドラである reaper がジョブ状態を更新済みのはず。
    pub fn suspend(&self) {
        unsafe {
            libc::sigsuspend(&self.old_mask);
        }
    }

    /// このガードが `SIGCHLD` をブロックする前のマスク — フォークした
    /// 子は親のブロック済みマスクを継承するのではなくこちらへ戻すべき。
    pub fn pre_block_mask(&self) -> &libc::sigset_t {
        &self.old_mask
    }
}

impl Drop for SigchldGuard {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.old_mask, ptr::null_mut());
        }
    }
}
