//! ビルトインコマンドの一覧。シェル自身のプロセス内で動かねばならない
//! 一握りのコマンド（`cd`、`exit`、`export`、`unset`）に加え、ジョブ
//! テーブルと直接やり取りするだけで何も起動しないジョブ制御の動詞
//! （`jobs`、`fg`、`bg`、`kill`）を扱う。

use std::env;
use std::path::Path;

use crate::control;
use crate::reporter::{self, Filter};
use crate::shell::Shell;

pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "exit" | "cd" | "pwd" | "echo" | "export" | "unset" | "jobs" | "fg" | "bg" | "kill"
    )
}

/// `argv[0]` を振り分ける。ビルトインだったら `Some(status)`、呼び出し元が
/// 外部コマンドへ fall back すべきなら `None` を返す。
pub fn try_builtin(shell: &mut Shell, argv: &[String]) -> Option<i32> {
    let args: Vec<&str> = argv.iter().map(String::as_str).collect();
    match args.first().copied()? {
        "exit" => Some(builtin_exit(shell, &args)),
        "cd" => Some(builtin_cd(&args)),
        "pwd" => Some(builtin_pwd()),
        "echo" => Some(builtin_echo(&args)),
        "export" => Some(builtin_export(&args)),
        "unset" => Some(builtin_unset(&args)),
        "jobs" => Some(builtin_jobs()),
        "fg" => Some(builtin_fg(shell, &args)),
        "bg" => Some(builtin_bg(shell, &args)),
        "kill" => Some(builtin_kill(&args)),
        _ => None,
    }
}

/// `%N` と裸の `N` はどちらもジョブテーブルのインデックス `N` を指す。
fn parse_job_spec(arg: &str) -> Option<usize> {
    arg.strip_prefix('%').unwrap_or(arg).parse().ok()
}

// ── 素朴なビルトイン ──────────────────────────────────────────────

/// `exit [N]` — REPL ループを終える。`N` を指定すればそれが終了コード、
/// 省略時は直前のフォアグラウンドのステータスを使う。
fn builtin_exit(shell: &mut Shell, args: &[&str]) -> i32 {
    shell.should_exit = true;
    if args.len() > 1 {
        args[1].parse::<i32>().unwrap_or_else(|_| {
            eprintln!("jcsh: exit: {}: numeric argument required", args[1]);
            2
        })
    } else {
        shell.last_status
    }
}

/// `cd [dir]` — 引数がなければ `$HOME` に移動する。
fn builtin_cd(args: &[&str]) -> i32 {
    let target = if args.len() > 1 {
        args[1].to_string()
    } else {
        match env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("jcsh: cd: HOME not set");
                return 1;
            }
        }
    };

    if let Err(e) = env::set_current_dir(Path::new(&target)) {
        eprintln!("jcsh: cd: {}: {}", target, e);
        1
    } else {
        0
    }
}

fn builtin_pwd() -> i32 {
    match env::current_dir() {
        Ok(path) => {
            println!("{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("jcsh: pwd: {}", e);
            1
        }
    }
}

/// `echo [-n] args...`
fn builtin_echo(args: &[&str]) -> i32 {
    let (no_newline, words) = if args.len() > 1 && args[1] == "-n" {
        (true, &args[2..])
    } else {
        (false, &args[1..])
    };

    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            print!(" ");
        }
        print!("{}", word);
    }
    if !no_newline {
        println!();
    }
    0
}

/// `export [VAR=val...]` — 引数なしなら全変数をソート済みで一覧表示する。
fn builtin_export(args: &[&str]) -> i32 {
    if args.len() <= 1 {
        let mut vars: Vec<(String, String)> = env::vars().collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in &vars {
            println!("declare -x {}=\"{}\"", key, value);
        }
        return 0;
    }

    for arg in &args[1..] {
        if let Some(eq_pos) = arg.find('=') {
            let key = &arg[..eq_pos];
            let value = &arg[eq_pos + 1..];
            env::set_var(key, value);
        }
    }
    0
}

fn builtin_unset(args: &[&str]) -> i32 {
    for arg in &args[1..] {
        env::remove_var(arg);
    }
    0
}

// ── ジョブ制御の動詞 ──────────────────────────────────────────────

fn builtin_jobs() -> i32 {
    reporter::report(Filter::All);
    0
}

fn resolve_job_spec(args: &[&str], name: &str) -> Result<Option<usize>, ()> {
    match args.get(1) {
        Some(spec) => match parse_job_spec(spec) {
            Some(idx) => Ok(Some(idx)),
            None => {
                eprintln!("jcsh: {}: {}: no such job", name, spec);
                Err(())
            }
        },
        None => Ok(None),
    }
}

/// `fg [job_spec]` — ジョブをフォアグラウンドへ戻す。省略時は未完了の
/// 最大インデックスを選ぶ。
fn builtin_fg(shell: &mut Shell, args: &[&str]) -> i32 {
    let idx = match resolve_job_spec(args, "fg") {
        Ok(idx) => idx,
        Err(()) => return 1,
    };
    if control::resume(shell, idx, false) {
        shell.last_status
    } else {
        eprintln!("jcsh: fg: no such job");
        1
    }
}

/// `bg [job_spec]` — 停止中のジョブをバックグラウンドで再開する。
fn builtin_bg(shell: &mut Shell, args: &[&str]) -> i32 {
    let idx = match resolve_job_spec(args, "bg") {
        Ok(idx) => idx,
        Err(()) => return 1,
    };
    if control::resume(shell, idx, true) {
        0
    } else {
        eprintln!("jcsh: bg: no such job");
        1
    }
}

fn builtin_kill(args: &[&str]) -> i32 {
    let spec = match args.get(1) {
        Some(spec) => spec,
        None => {
            eprintln!("jcsh: kill: usage: kill %job");
            return 1;
        }
    };
    match parse_job_spec(spec) {
        Some(idx) if control::kill_job(idx) => 0,
        _ => {
            eprintln!("jcsh: kill: {}: no such job", spec);
            1
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_builtin_check() {
        assert!(is_builtin("cd"));
        assert!(is_builtin("jobs"));
        assert!(is_builtin("fg"));
        assert!(!is_builtin("ls"));
    }

    #[test]
    fn parse_job_spec_accepts_percent_and_bare_forms() {
        assert_eq!(parse_job_spec("%3"), Some(3));
        assert_eq!(parse_job_spec("3"), Some(3));
        assert_eq!(parse_job_spec("abc"), None);
    }

    #[test]
    fn unset_removes_var() {
        env::set_var("JCSH_TEST_UNSET", "value");
        builtin_unset(&["unset", "JCSH_TEST_UNSET"]);
        assert!(env::var("JCSH_TEST_UNSET").is_err());
    }

    #[test]
    fn export_value_with_equals() {
        builtin_export(&["export", "JCSH_TEST_EQ=A=B=C"]);
        assert_eq!(env::var("JCSH_TEST_EQ").unwrap(), "A=B=C");
        env::remove_var("JCSH_TEST_EQ");
    }
}
