//! Filename classification into board and data identities.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// Ranking board cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Board {
    /// 日刊.
    #[serde(rename = "vocaloid-daily")]
    Daily,
    /// 周刊.
    #[serde(rename = "vocaloid-weekly")]
    Weekly,
    /// 月刊.
    #[serde(rename = "vocaloid-monthly")]
    Monthly,
}

impl Board {
    /// All boards, in cadence order.
    pub const ALL: [Board; 3] = [Board::Daily, Board::Weekly, Board::Monthly];

    /// Token used in filenames and on the wire.
    pub fn token(self) -> &'static str {
        match self {
            Board::Daily => "vocaloid-daily",
            Board::Weekly => "vocaloid-weekly",
            Board::Monthly => "vocaloid-monthly",
        }
    }

    /// Human label shown in the dialog header.
    pub fn label(self) -> &'static str {
        match self {
            Board::Daily => "日刊",
            Board::Weekly => "周刊",
            Board::Monthly => "月刊",
        }
    }

    /// Parses a filename token. Only exact tokens are accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.token() == token)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Board part: the main ranking or the new-songs ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// 主榜.
    Main,
    /// 新曲榜.
    New,
}

impl Part {
    /// All parts.
    pub const ALL: [Part; 2] = [Part::Main, Part::New];

    /// Token used in filenames and on the wire.
    pub fn token(self) -> &'static str {
        match self {
            Part::Main => "main",
            Part::New => "new",
        }
    }

    /// Human label shown in the dialog header.
    pub fn label(self) -> &'static str {
        match self {
            Part::Main => "主榜",
            Part::New => "新曲榜",
        }
    }

    /// Parses a filename token. Only exact tokens are accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token() == token)
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One periodic ranking edition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BoardIdentity {
    /// Board cadence.
    pub board: Board,
    /// Main or new-songs part.
    pub part: Part,
    /// Issue number, always >= 1.
    pub issue: u32,
}

impl BoardIdentity {
    /// Dialog header line, e.g. `周刊 主榜 第 87 期`.
    pub fn header(&self) -> String {
        format!("{} {} 第 {} 期", self.board.label(), self.part.label(), self.issue)
    }
}

impl fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.board, self.part, self.issue)
    }
}

/// One daily snapshot, keyed by calendar date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DataIdentity {
    /// Snapshot day.
    pub date: NaiveDate,
}

impl DataIdentity {
    /// The snapshot key sent to the backend (`yyyy-MM-dd`).
    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DataIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format(DATE_FORMAT))
    }
}

/// Classified identity of an uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Ranking file, handled by the board workflow.
    Board(BoardIdentity),
    /// Snapshot file, handled by the data workflow.
    Data(DataIdentity),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Board(b) => write!(f, "board {b}"),
            Identity::Data(d) => write!(f, "data {d}"),
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Classifies an uploaded file by name.
///
/// Accepted layouts, after the final extension is stripped:
/// - `vocaloid-{daily|weekly|monthly}-{main|new}-{issue}` with `issue >= 1`
///   written without leading zeros
/// - `yyyy-MM-dd`
///
/// The two layouts cannot overlap: a date stem never ends in a part token
/// followed by a number, and a board stem never has the `4-2-2` digit shape.
pub fn classify(filename: &str) -> Result<Identity, ClassifyError> {
    let stem = strip_extension(filename);

    if let Some((year, month, day)) = date_shape(stem) {
        return NaiveDate::from_ymd_opt(year, month, day)
            .map(|date| Identity::Data(DataIdentity { date }))
            .ok_or_else(|| ClassifyError::InvalidDate(filename.to_string()));
    }

    board_identity(stem)
        .map(Identity::Board)
        .ok_or_else(|| ClassifyError::UnrecognizedFilename(filename.to_string()))
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

fn board_identity(stem: &str) -> Option<BoardIdentity> {
    let mut segments = stem.rsplitn(3, '-');
    let issue = segments.next()?;
    let part = segments.next()?;
    let board = segments.next()?;

    // Canonical decimal only, so `Display` gives back the same stem.
    if issue.starts_with('0') {
        return None;
    }
    let issue = parse_digits(issue)?;

    Some(BoardIdentity {
        board: Board::from_token(board)?,
        part: Part::from_token(part)?,
        issue,
    })
}

/// Returns the numeric fields of a `dddd-dd-dd` stem without range checks.
fn date_shape(stem: &str) -> Option<(i32, u32, u32)> {
    let mut fields = stem.split('-');
    let year = fields.next().filter(|s| s.len() == 4)?;
    let month = fields.next().filter(|s| s.len() == 2)?;
    let day = fields.next().filter(|s| s.len() == 2)?;
    if fields.next().is_some() {
        return None;
    }
    Some((parse_digits(year)? as i32, parse_digits(month)?, parse_digits(day)?))
}

/// Parses a run of ASCII digits. Rejects signs, whitespace and overflow.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(board: Board, part: Part, issue: u32) -> Identity {
        Identity::Board(BoardIdentity { board, part, issue })
    }

    fn date(y: i32, m: u32, d: u32) -> Identity {
        Identity::Data(DataIdentity {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        })
    }

    #[test]
    fn classifies_every_board_and_part() {
        for b in Board::ALL {
            for p in Part::ALL {
                let name = format!("{}-{}-12.csv", b.token(), p.token());
                assert_eq!(classify(&name).unwrap(), board(b, p, 12), "{name}");
            }
        }
    }

    #[test]
    fn classifies_weekly_main_example() {
        assert_eq!(
            classify("vocaloid-weekly-main-87.csv").unwrap(),
            board(Board::Weekly, Part::Main, 87)
        );
    }

    #[test]
    fn extension_is_optional() {
        assert_eq!(
            classify("vocaloid-daily-new-3").unwrap(),
            board(Board::Daily, Part::New, 3)
        );
        assert_eq!(classify("2024-05-01").unwrap(), date(2024, 5, 1));
    }

    #[test]
    fn only_the_last_extension_is_stripped() {
        assert_eq!(
            classify("vocaloid-monthly-main-7.tar.gz").unwrap_err(),
            ClassifyError::UnrecognizedFilename("vocaloid-monthly-main-7.tar.gz".into())
        );
    }

    #[test]
    fn classifies_dates() {
        assert_eq!(classify("2024-05-01.json").unwrap(), date(2024, 5, 1));
        assert_eq!(classify("2024-02-29.xlsx").unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn calendar_invalid_dates_are_rejected() {
        for name in ["2024-02-30.json", "2023-02-29.json", "2024-04-31.csv", "2024-13-01", "2024-00-10"] {
            assert_eq!(
                classify(name).unwrap_err(),
                ClassifyError::InvalidDate(name.into()),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_malformed_board_names() {
        for name in [
            "garbage.txt",
            "vocaloid-yearly-main-1.csv",
            "vocaloid-weekly-old-1.csv",
            "vocaloid-weekly-main-0.csv",
            "vocaloid-weekly-main--1.csv",
            "vocaloid-weekly-main-+1.csv",
            "vocaloid-weekly-main-x1.csv",
            "vocaloid-weekly-main.csv",
            "weekly-main-1.csv",
            "vocaloid-weekly-main-99999999999.csv",
            "",
            ".csv",
        ] {
            assert_eq!(
                classify(name).unwrap_err(),
                ClassifyError::UnrecognizedFilename(name.into()),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_zero_padded_issue() {
        for name in ["vocaloid-weekly-main-007.csv", "vocaloid-daily-new-00", "vocaloid-monthly-main-010"] {
            assert_eq!(
                classify(name).unwrap_err(),
                ClassifyError::UnrecognizedFilename(name.into()),
                "{name}"
            );
        }
    }

    #[test]
    fn board_stem_round_trips_through_display() {
        for stem in ["vocaloid-weekly-main-7", "vocaloid-daily-new-402", "vocaloid-monthly-main-10"] {
            let Identity::Board(id) = classify(&format!("{stem}.csv")).unwrap() else {
                panic!("expected board for {stem}");
            };
            assert_eq!(id.to_string(), stem);
        }
    }

    #[test]
    fn rejects_loose_date_shapes() {
        for name in ["2024-5-01.json", "24-05-01.json", "2024-05-01-02.json", "2024_05_01.json"] {
            assert_eq!(
                classify(name).unwrap_err(),
                ClassifyError::UnrecognizedFilename(name.into()),
                "{name}"
            );
        }
    }

    #[test]
    fn classification_is_deterministic() {
        for name in ["vocaloid-weekly-main-87.csv", "2024-05-01.json", "garbage.txt"] {
            assert_eq!(classify(name), classify(name));
        }
    }

    #[test]
    fn headers_and_keys() {
        let id = BoardIdentity { board: Board::Weekly, part: Part::Main, issue: 87 };
        assert_eq!(id.header(), "周刊 主榜 第 87 期");
        assert_eq!(id.to_string(), "vocaloid-weekly-main-87");

        let data = DataIdentity { date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() };
        assert_eq!(data.date_key(), "2024-05-01");
    }

    #[test]
    fn identity_serde_is_tagged() {
        let id = board(Board::Weekly, Part::New, 5);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"kind":"board","board":"vocaloid-weekly","part":"new","issue":5}"#);
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
