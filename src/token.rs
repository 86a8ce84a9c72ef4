//! 意図的に最小限のコマンドラインのトークナイザ。空白区切りの単語と
//! `<`/`>`/`|`/`&` を単独演算子として扱うだけ。クォートも変数展開も
//! グロブもない。
//!
//! 戻り値は所有権を持つ `Vec<Token>`。パイプラインランチャはこれを
//! 分割・フィルタして消費するだけで、共有バッファをその場で書き換える
//! ことはしない。

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Input,
    Output,
    Pipe,
    Background,
}

/// `line` を空白で分割する。`<`、`>`、`|`、`&` は、それ単独の単語として
/// 現れた場合に限り演算子トークンとして認識する。
pub fn tokenize(line: &str) -> Vec<Token> {
    line.split_whitespace()
        .map(|word| match word {
            "<" => Token::Input,
            ">" => Token::Output,
            "|" => Token::Pipe,
            "&" => Token::Background,
            _ => Token::Word(word.to_string()),
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words() {
        assert_eq!(
            tokenize("echo hello world"),
            vec![
                Token::Word("echo".into()),
                Token::Word("hello".into()),
                Token::Word("world".into()),
            ]
        );
    }

    #[test]
    fn recognizes_operators() {
        assert_eq!(
            tokenize("cat < in.txt > out.txt"),
            vec![
                Token::Word("cat".into()),
                Token::Input,
                Token::Word("in.txt".into()),
                Token::Output,
                Token::Word("out.txt".into()),
            ]
        );
    }

    #[test]
    fn pipe_and_background() {
        assert_eq!(
            tokenize("sleep 10 &"),
            vec![
                Token::Word("sleep".into()),
                Token::Word("10".into()),
                Token::Background,
            ]
        );
        assert_eq!(
            tokenize("cat file | tr a-z A-Z"),
            vec![
                Token::Word("cat".into()),
                Token::Word("file".into()),
                Token::Pipe,
                Token::Word("tr".into()),
                Token::Word("a-z".into()),
                Token::Word("A-Z".into()),
            ]
        );
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }
}
