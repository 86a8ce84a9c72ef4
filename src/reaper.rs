//! 本物の `SIGCHLD` ハンドラ。
//!
//! 子プロセスが状態を変えるたびに非同期に呼ばれる。終了・シグナルによる
//! 終了・停止・再開の通知を要求しつつ「任意の子」についてノンブロッキング
//! にループし、ジョブテーブルを直接更新する（ロックなしで安全な理由は
//! [`crate::job`] のモジュールコメントを参照）。

use crate::job;

/// `SIGCHLD` 用のハンドラ。`sa_mask` に `SIGINT` を含めてインストールされて
/// おり、このハンドラの内部ではシェルのコードに割り込んでジョブテーブルへ
/// 同時アクセスすることが起こり得ない。
pub extern "C" fn sigchld_handler(_sig: libc::c_int) {
    // このハンドラの実行中も周囲の errno を保存しておく。割り込まれた
    // メインスレッド側のコードがたまたま失敗していたシステムコールは、
    // 戻ったあとも自分自身の errno を見えなければならない。
    let saved_errno = unsafe { *libc::__errno_location() };

    loop {
        let mut status: libc::c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid <= 0 {
            break;
        }

        job::reap_mark(pid, status);
    }

    unsafe {
        *libc::__errno_location() = saved_errno;
    }
}
