//! Filename helpers shared by upload and download.
//!
//! Client-supplied names are never joined to the storage root as-is; they go
//! through [`secure_filename`] first. The result only contains ASCII letters,
//! digits, `_`, `.` and `-`, never starts with `.`, `_` or `-`, and never
//! contains a path separator.

/// Map an arbitrary client filename to one that is safe to join to a directory.
///
/// May return an empty string (e.g. for `".."`); callers must handle that.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_start_matches(['.', '_', '-'])
        .trim_end_matches(['.', '_'])
        .to_string()
}

/// Lower-cased text after the last `.`, if the name has one.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(secure_filename("report.pdf"), "report.pdf");
        assert_eq!(secure_filename("photo-2024_01.JPG"), "photo-2024_01.JPG");
    }

    #[test]
    fn joins_whitespace_with_underscores() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("  a \t b.txt "), "a_b.txt");
    }

    #[test]
    fn strips_directory_components() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("/etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\..\\boot.ini"), "boot.ini");
        assert!(!secure_filename("a/../../b.txt").contains('/'));
    }

    #[test]
    fn removes_null_bytes_and_control_characters() {
        assert_eq!(secure_filename("evil\0.txt"), "evil.txt");
        assert_eq!(secure_filename("line\r\nbreak.txt"), "line_break.txt");
    }

    #[test]
    fn strips_leading_dots_and_dashes() {
        assert_eq!(secure_filename(".bashrc"), "bashrc");
        assert_eq!(secure_filename("--help.txt"), "help.txt");
        assert_eq!(secure_filename("_x_.txt_"), "x_.txt");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(secure_filename("résumé.pdf"), "rsum.pdf");
        assert_eq!(secure_filename("日本語.txt"), "txt");
    }

    #[test]
    fn may_produce_empty_names() {
        assert_eq!(secure_filename(".."), "");
        assert_eq!(secure_filename("../.."), "");
        assert_eq!(secure_filename(""), "");
        assert_eq!(secure_filename("***"), "");
    }

    #[test]
    fn extension_is_last_segment_lowercased() {
        assert_eq!(extension_of("archive.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension_of("photo.JPEG").as_deref(), Some("jpeg"));
        assert_eq!(extension_of("trailing.").as_deref(), Some(""));
        assert_eq!(extension_of("README"), None);
    }
}
