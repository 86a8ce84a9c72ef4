//! ジョブ制御シェルのライブラリ表層 — `main.rs` は薄い REPL ループに
//! とどめ、実処理は全てここに置くことでテストが各モジュールへ直接
//! 到達できるようにする。
//!
//! ## モジュール
//!
//! | module | role |
//! |--------|------|
//! | [`error`] | 内務作業のシステムコール失敗を表すシェル共通エラー型 |
//! | [`terminal`] | 制御端末の所有権と保存済みモード |
//! | [`signals`] | シグナル設定のインストールと `SigchldGuard` 能力トークン |
//! | [`job`] | プロセス/ジョブテーブルとその状態機械 |
//! | [`reaper`] | 本物の `SIGCHLD` ハンドラ |
//! | [`monitor`] | シグナルサスペンドによるフォアグラウンドジョブ監視 |
//! | [`control`] | `fg`/`bg`/`kill` のジョブ制御操作 |
//! | [`reporter`] | バックグラウンドジョブの状態変化報告 |
//! | [`token`] | コマンドラインのトークナイザ |
//! | [`pipeline`] | パイプライン構築、fd の後始末、プロセス起動 |
//! | [`builtins`] | プロセス内コマンドとジョブ制御の動詞 |
//! | [`exec`] | `execvp` による外部コマンド起動 |
//! | [`shutdown`] | シェル終了前に残りジョブを片付ける |
//! | [`shell`] | シェル自身の長命な状態 |

pub mod builtins;
pub mod control;
pub mod error;
pub mod exec;
pub mod job;
pub mod monitor;
pub mod pipeline;
pub mod reaper;
pub mod reporter;
pub mod shell;
pub mod shutdown;
pub mod signals;
pub mod terminal;
pub mod token;
