use crate::error::{Error, ErrorKind};
use crate::models::IdType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Broad category an Item belongs to.
///
/// Identity matching only considers Items inside the same category, so an
/// IMDB id shared by a Movie and a TV episode never accidentally converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Book,
    Movie,
    Tv,
    Music,
    Game,
    Podcast,
    Performance,
}
impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Music => "music",
            Self::Game => "game",
            Self::Podcast => "podcast",
            Self::Performance => "performance",
        }
    }
}
impl FromStr for ItemCategory {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "book" => Self::Book,
            "movie" => Self::Movie,
            "tv" => Self::Tv,
            "music" => Self::Music,
            "game" => Self::Game,
            "podcast" => Self::Podcast,
            "performance" => Self::Performance,
            _ => exn::bail!(ErrorKind::Parse { field: "category" }),
        })
    }
}
impl Display for ItemCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// The concrete variant of an Item.
///
/// Adapters name one of these as their default, and scraped metadata may
/// override it with a `preferred_model` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemModel {
    Edition,
    Work,
    Movie,
    TVShow,
    TVSeason,
    TVEpisode,
    Album,
    Game,
    Podcast,
    PodcastEpisode,
    Performance,
    PerformanceProduction,
}

impl ItemModel {
    pub const ALL: &'static [ItemModel] = &[
        Self::Edition,
        Self::Work,
        Self::Movie,
        Self::TVShow,
        Self::TVSeason,
        Self::TVEpisode,
        Self::Album,
        Self::Game,
        Self::Podcast,
        Self::PodcastEpisode,
        Self::Performance,
        Self::PerformanceProduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edition => "Edition",
            Self::Work => "Work",
            Self::Movie => "Movie",
            Self::TVShow => "TVShow",
            Self::TVSeason => "TVSeason",
            Self::TVEpisode => "TVEpisode",
            Self::Album => "Album",
            Self::Game => "Game",
            Self::Podcast => "Podcast",
            Self::PodcastEpisode => "PodcastEpisode",
            Self::Performance => "Performance",
            Self::PerformanceProduction => "PerformanceProduction",
        }
    }

    pub fn category(&self) -> ItemCategory {
        match self {
            Self::Edition | Self::Work => ItemCategory::Book,
            Self::Movie => ItemCategory::Movie,
            Self::TVShow | Self::TVSeason | Self::TVEpisode => ItemCategory::Tv,
            Self::Album => ItemCategory::Music,
            Self::Game => ItemCategory::Game,
            Self::Podcast | Self::PodcastEpisode => ItemCategory::Podcast,
            Self::Performance | Self::PerformanceProduction => ItemCategory::Performance,
        }
    }

    /// External id types an Item of this variant may hold as its primary
    /// lookup id, in the variant's own order of preference.
    pub fn lookup_id_types(&self) -> &'static [IdType] {
        use IdType::*;
        match self {
            Self::Edition => &[Isbn, Cubn, Asin, Goodreads, GoogleBooks, OpenLibrary, DoubanBook],
            Self::Work => &[WikiData, GoodreadsWork, OpenLibraryWork, DoubanBookWork],
            Self::Movie => &[Imdb, TmdbMovie, DoubanMovie, WikiData],
            Self::TVShow => &[Imdb, TmdbTv, DoubanMovie, WikiData],
            Self::TVSeason => &[TmdbTvSeason, DoubanMovie, Imdb],
            Self::TVEpisode => &[Imdb, TmdbTvEpisode],
            Self::Album => &[Gtin, Isrc, MusicBrainz, SpotifyAlbum, Bandcamp, DiscogsRelease, DoubanMusic],
            Self::Game => &[Igdb, Steam, DoubanGame, Bangumi, WikiData],
            Self::Podcast => &[Rss, ApplePodcast, SpotifyShow],
            Self::PodcastEpisode => &[],
            Self::Performance => &[DoubanDrama, WikiData],
            Self::PerformanceProduction => &[DoubanDramaVersion],
        }
    }

    pub fn supports_id_type(&self, id_type: IdType) -> bool {
        self.lookup_id_types().contains(&id_type)
    }

    /// The variant an Item of this variant hangs off, if any.
    pub fn parent_model(&self) -> Option<ItemModel> {
        match self {
            Self::Edition => Some(Self::Work),
            Self::TVSeason => Some(Self::TVShow),
            Self::TVEpisode => Some(Self::TVSeason),
            Self::PodcastEpisode => Some(Self::Podcast),
            Self::PerformanceProduction => Some(Self::Performance),
            _ => None,
        }
    }

    /// Pick the best primary lookup id for this variant out of a set of
    /// candidate (already normalized) ids.
    ///
    /// Widely shared identifiers ([`IDEAL_ID_TYPES`](crate::models::IDEAL_ID_TYPES))
    /// win, then the variant's own declared order.
    pub fn best_lookup_id<'a>(&self, candidates: &'a [(IdType, String)]) -> Option<&'a (IdType, String)> {
        crate::models::IDEAL_ID_TYPES
            .iter()
            .chain(self.lookup_id_types())
            .filter(|t| self.supports_id_type(**t))
            .find_map(|t| candidates.iter().find(|(ct, _)| ct == t))
    }
}
impl FromStr for ItemModel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Parse { field: "model" }))
    }
}
impl Display for ItemModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Edition", ItemModel::Edition)]
    #[case("tvshow", ItemModel::TVShow)]
    #[case(" PerformanceProduction ", ItemModel::PerformanceProduction)]
    fn test_parse_model(#[case] raw: &str, #[case] expected: ItemModel) {
        assert_eq!(raw.parse::<ItemModel>().unwrap(), expected);
    }

    #[test]
    fn test_parent_shares_category() {
        for model in ItemModel::ALL {
            if let Some(parent) = model.parent_model() {
                assert_eq!(parent.category(), model.category(), "{model} -> {parent}");
            }
        }
    }

    #[test]
    fn test_best_lookup_id_prefers_ideal_types() {
        let candidates = vec![
            (IdType::Goodreads, "123".to_string()),
            (IdType::Isbn, "9780553283686".to_string()),
        ];
        let best = ItemModel::Edition.best_lookup_id(&candidates).unwrap();
        assert_eq!(best.0, IdType::Isbn);
    }

    #[test]
    fn test_best_lookup_id_ignores_unsupported_types() {
        let candidates = vec![(IdType::Isbn, "9780553283686".to_string())];
        assert!(ItemModel::Movie.best_lookup_id(&candidates).is_none());
        let candidates = vec![(IdType::Isbn, "9780553283686".to_string()), (IdType::TmdbMovie, "27205".to_string())];
        assert_eq!(ItemModel::Movie.best_lookup_id(&candidates).unwrap().0, IdType::TmdbMovie);
    }
}
