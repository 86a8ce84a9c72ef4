//! シェルのコンテキスト。エントリルーチンが所有し、ほぼ全ての処理へ
//! 引き回される長命な値。ジョブテーブルだけは例外で、シグナルハンドラが
//! `static` として直接触れる必要がある（[`crate::job`] 参照）。

use crate::terminal::Terminal;

pub struct Shell {
    pub terminal: Terminal,
    /// 直近に完了したフォアグラウンドコマンドの終了ステータス。`exit`
    /// ビルトインのデフォルトコードにもなる。
    pub last_status: i32,
    /// `exit` ビルトインが立て、REPL ループを終わらせる。
    pub should_exit: bool,
}

impl Shell {
    pub fn new(terminal: Terminal) -> Self {
        Self {
            terminal,
            last_status: 0,
            should_exit: false,
        }
    }
}
