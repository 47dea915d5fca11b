//! External identifier types and their normalization rules.

use crate::consts::{ASIN_REGEX, IMDB_REGEX, NUMERIC_REGEX};
use crate::error::{Error, ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

macro_rules! id_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every external identifier type the catalog knows about.
        ///
        /// The string form is what gets persisted, so never rename one.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum IdType {
            $($variant,)+
        }
        impl IdType {
            pub const ALL: &'static [IdType] = &[$(IdType::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(IdType::$variant => $name,)+
                }
            }
        }
        impl FromStr for IdType {
            type Err = Error;
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(match s.trim().to_lowercase().as_str() {
                    $($name => IdType::$variant,)+
                    _ => exn::bail!(ErrorKind::Parse { field: "id_type" }),
                })
            }
        }
    };
}

id_types! {
    WikiData => "wikidata",
    Isbn => "isbn",
    Asin => "asin",
    Cubn => "cubn",
    Gtin => "gtin",
    Isrc => "isrc",
    MusicBrainz => "musicbrainz",
    Rss => "rss",
    Imdb => "imdb",
    TmdbMovie => "tmdb_movie",
    TmdbTv => "tmdb_tv",
    TmdbTvSeason => "tmdb_tvseason",
    TmdbTvEpisode => "tmdb_tvepisode",
    Goodreads => "goodreads",
    GoodreadsWork => "goodreads_work",
    GoogleBooks => "googlebooks",
    OpenLibrary => "openlibrary",
    OpenLibraryWork => "openlibrary_work",
    DoubanBook => "doubanbook",
    DoubanBookWork => "doubanbook_work",
    DoubanMovie => "doubanmovie",
    DoubanMusic => "doubanmusic",
    DoubanGame => "doubangame",
    DoubanDrama => "doubandrama",
    DoubanDramaVersion => "doubandrama_version",
    SpotifyAlbum => "spotify_album",
    SpotifyShow => "spotify_show",
    Bandcamp => "bandcamp",
    DiscogsRelease => "discogs_release",
    Igdb => "igdb",
    Steam => "steam",
    Bangumi => "bangumi",
    ApplePodcast => "apple_podcast",
}

impl Display for IdType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Preferred order when several ids could serve as an Item's primary lookup
/// id. Widely shared identifiers win over site-specific ones so that
/// different sources converge on the same key.
pub const IDEAL_ID_TYPES: &[IdType] = &[
    IdType::Isbn,
    IdType::Cubn,
    IdType::Asin,
    IdType::Gtin,
    IdType::Isrc,
    IdType::MusicBrainz,
    IdType::Rss,
    IdType::Imdb,
];

impl IdType {
    /// Normalize a raw identifier value of this type.
    ///
    /// Malformed values are rejected with [`ErrorKind::InvalidIdentifier`].
    /// Note that ISBN normalization always yields the 13-digit form, and an
    /// ASIN that is really an ISBN-10 is rejected here (use [`detect_isbn_asin`]
    /// to disambiguate first).
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let invalid = || ErrorKind::InvalidIdentifier {
            id_type: self.as_str(),
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            exn::bail!(invalid());
        }
        let normalized = match self {
            IdType::Isbn => {
                let compact = compact_code(trimmed);
                match compact.len() {
                    13 if is_isbn13(&compact) => Some(compact),
                    10 => isbn10_to_isbn13(&compact),
                    _ => None,
                }
            },
            IdType::Asin => Some(compact_code(trimmed)).filter(|v| ASIN_REGEX.is_match(v)),
            IdType::Imdb => Some(trimmed.to_lowercase()).filter(|v| IMDB_REGEX.is_match(v)),
            IdType::Gtin => Some(compact_code(trimmed)).filter(|v| matches!(v.len(), 8 | 12 | 13 | 14) && NUMERIC_REGEX.is_match(v)),
            IdType::Isrc => Some(compact_code(trimmed)).filter(|v| v.len() == 12),
            IdType::TmdbMovie
            | IdType::TmdbTv
            | IdType::Goodreads
            | IdType::GoodreadsWork
            | IdType::DoubanBook
            | IdType::DoubanBookWork
            | IdType::DoubanMovie
            | IdType::DoubanMusic
            | IdType::DoubanGame
            | IdType::DoubanDrama
            | IdType::DiscogsRelease
            | IdType::Steam
            | IdType::Bangumi
            | IdType::ApplePodcast => Some(trimmed.to_string()).filter(|v| NUMERIC_REGEX.is_match(v)),
            IdType::WikiData => {
                let upper = trimmed.to_uppercase();
                Some(upper).filter(|v| v.starts_with('Q') && NUMERIC_REGEX.is_match(&v[1..]))
            },
            // Anything else is an opaque string that only needs to be
            // non-empty and free of surrounding whitespace.
            _ => Some(trimmed.to_string()),
        };
        normalized.ok_or_else(|| exn::Exn::from(invalid()))
    }
}

/// Upper-case and strip everything that isn't a digit or ASCII letter.
fn compact_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_uppercase()).collect()
}

fn is_isbn13(code: &str) -> bool {
    if code.len() != 13 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = code
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    sum % 10 == 0
}

fn is_isbn10(code: &str) -> bool {
    if code.len() != 10 {
        return false;
    }
    let mut sum = 0;
    for (i, c) in code.chars().enumerate() {
        let value = match (i, c) {
            (9, 'X') => 10,
            (_, c) if c.is_ascii_digit() => c as u32 - '0' as u32,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

/// Convert a (valid) ISBN-10 to its ISBN-13 equivalent.
fn isbn10_to_isbn13(code: &str) -> Option<String> {
    if !is_isbn10(code) {
        return None;
    }
    let body = format!("978{}", &code[..9]);
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;
    Some(format!("{body}{check}"))
}

/// Decide whether an ambiguous product code is an ISBN or an ASIN.
///
/// Some sources put ISBN-10s in their ASIN field and vice versa. Returns the
/// normalized `(IdType, value)` pair, or `None` if the code is neither.
pub fn detect_isbn_asin(raw: &str) -> Option<(IdType, String)> {
    let code = compact_code(raw);
    if is_isbn13(&code) {
        return Some((IdType::Isbn, code));
    }
    if let Some(isbn) = isbn10_to_isbn13(&code) {
        return Some((IdType::Isbn, isbn));
    }
    if ASIN_REGEX.is_match(&code) {
        return Some((IdType::Asin, code));
    }
    None
}

/// Normalize a `(type, value)` pair, routing ISBN/ASIN values through
/// [`detect_isbn_asin`] so that a mislabelled code still lands on the right
/// type.
pub fn normalize_pair(id_type: IdType, raw: &str) -> Result<(IdType, String)> {
    if matches!(id_type, IdType::Isbn | IdType::Asin)
        && let Some(pair) = detect_isbn_asin(raw)
    {
        return Ok(pair);
    }
    Ok((id_type, id_type.normalize(raw)?))
}
