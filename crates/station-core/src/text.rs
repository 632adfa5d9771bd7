//! Title normalization for show matching.
//!
//! Calendar event titles are free text typed by whoever maintains the
//! calendar, so apostrophe style, dash style and spacing drift from the
//! catalog's show names. Normalization folds those variants before any
//! exact or fuzzy comparison.

/// Lowercase, fold quote/dash variants to ASCII, collapse whitespace runs.
pub fn normalize_title(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true; // leading whitespace is dropped

    for ch in input.chars() {
        let folded = match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => '-',
            c => c,
        };

        if folded.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }

        last_was_space = false;
        for lower in folded.to_lowercase() {
            out.push(lower);
        }
    }

    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(normalize_title("  The Night Shift "), "the night shift");
    }

    #[test]
    fn test_folds_curly_apostrophe() {
        assert_eq!(
            normalize_title("Sister\u{2019}s Show"),
            normalize_title("Sister's Show")
        );
    }

    #[test]
    fn test_folds_curly_double_quotes() {
        assert_eq!(normalize_title("\u{201C}Live\u{201D} Hour"), "\"live\" hour");
    }

    #[test]
    fn test_folds_dashes() {
        assert_eq!(
            normalize_title("Dusk \u{2014} Dawn"),
            normalize_title("Dusk - Dawn")
        );
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(normalize_title("Late\t\tNight   Dub"), "late night dub");
    }
}
