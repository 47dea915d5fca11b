//! Variant payloads.
//!
//! Every Item carries exactly one of these. Scraped metadata is a loose JSON
//! object, so payloads are built field by field: unknown keys are ignored and
//! a value of the wrong shape falls back to the field's default instead of
//! rejecting the whole payload.

use catalog_sites::models::ItemModel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Edition {
    pub title: String,
    pub subtitle: Option<String>,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub author: Vec<String>,
    pub translator: Vec<String>,
    pub language: Vec<String>,
    pub pub_house: Option<String>,
    pub pub_year: Option<i32>,
    pub pub_month: Option<u32>,
    pub binding: Option<String>,
    pub pages: Option<u32>,
    pub series: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Work {
    pub title: String,
    pub other_title: Vec<String>,
    pub author: Vec<String>,
    pub language: Vec<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movie {
    pub title: String,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub director: Vec<String>,
    pub playwright: Vec<String>,
    pub actor: Vec<String>,
    pub genre: Vec<String>,
    pub area: Vec<String>,
    pub language: Vec<String>,
    pub year: Option<i32>,
    pub duration: Option<String>,
    pub site: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TVShow {
    pub title: String,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub director: Vec<String>,
    pub playwright: Vec<String>,
    pub actor: Vec<String>,
    pub genre: Vec<String>,
    pub area: Vec<String>,
    pub language: Vec<String>,
    pub year: Option<i32>,
    pub season_count: Option<u32>,
    pub episode_count: Option<u32>,
    pub site: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TVSeason {
    pub title: String,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub director: Vec<String>,
    pub actor: Vec<String>,
    pub genre: Vec<String>,
    pub language: Vec<String>,
    pub season_number: Option<u32>,
    pub episode_count: Option<u32>,
    pub year: Option<i32>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TVEpisode {
    pub title: String,
    pub other_title: Vec<String>,
    pub episode_number: Option<u32>,
    pub air_date: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub title: String,
    pub other_title: Vec<String>,
    pub artist: Vec<String>,
    pub genre: Vec<String>,
    pub company: Vec<String>,
    pub track_list: Vec<String>,
    pub release_date: Option<String>,
    pub duration: Option<u32>,
    pub media: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Game {
    pub title: String,
    pub other_title: Vec<String>,
    pub developer: Vec<String>,
    pub publisher: Vec<String>,
    pub platform: Vec<String>,
    pub genre: Vec<String>,
    pub release_date: Option<String>,
    pub official_site: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Podcast {
    pub title: String,
    pub other_title: Vec<String>,
    pub host: Vec<String>,
    pub genre: Vec<String>,
    pub language: Vec<String>,
    pub official_site: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodcastEpisode {
    pub title: String,
    pub guid: Option<String>,
    pub pub_date: Option<String>,
    pub media_url: Option<String>,
    pub duration: Option<u32>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    pub title: String,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub genre: Vec<String>,
    pub language: Vec<String>,
    pub director: Vec<String>,
    pub playwright: Vec<String>,
    pub composer: Vec<String>,
    pub actor: Vec<String>,
    pub troupe: Vec<String>,
    pub location: Vec<String>,
    pub opening_date: Option<String>,
    pub closing_date: Option<String>,
    pub brief: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceProduction {
    pub title: String,
    pub orig_title: Option<String>,
    pub other_title: Vec<String>,
    pub language: Vec<String>,
    pub director: Vec<String>,
    pub actor: Vec<String>,
    pub troupe: Vec<String>,
    pub location: Vec<String>,
    pub opening_date: Option<String>,
    pub closing_date: Option<String>,
    pub brief: Option<String>,
}

macro_rules! item_kinds {
    ($($variant:ident),+ $(,)?) => {
        /// Variant-specific data of an Item, tagged by its [`ItemModel`].
        #[derive(Debug, Clone, PartialEq)]
        pub enum ItemKind {
            $($variant($variant),)+
        }
        impl ItemKind {
            pub fn model(&self) -> ItemModel {
                match self {
                    $(Self::$variant(_) => ItemModel::$variant,)+
                }
            }

            /// An empty payload of the given variant.
            pub fn empty(model: ItemModel) -> Self {
                match model {
                    $(ItemModel::$variant => Self::$variant($variant::default()),)+
                }
            }

            /// Build a payload of the given variant from loose metadata.
            pub fn from_map(model: ItemModel, metadata: &Map<String, Value>) -> Self {
                match model {
                    $(ItemModel::$variant => Self::$variant(lenient(metadata)),)+
                }
            }

            /// Every declared field of the payload, populated or not.
            pub fn to_map(&self) -> Map<String, Value> {
                match self {
                    $(Self::$variant(payload) => as_object(payload),)+
                }
            }

            pub fn title(&self) -> &str {
                match self {
                    $(Self::$variant(payload) => &payload.title,)+
                }
            }
        }
    };
}

item_kinds! {
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

impl ItemKind {
    /// Alternative titles, for the search projection.
    pub fn other_titles(&self) -> Vec<String> {
        match self.to_map().remove("other_title") {
            Some(Value::Array(values)) => values.into_iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        }
    }

    /// Copy values into fields that are currently empty. Populated fields
    /// are never touched.
    ///
    /// Returns `true` if anything changed.
    pub fn fill_missing(&mut self, metadata: &Map<String, Value>) -> bool {
        self.apply(metadata, |current, incoming| is_empty(current) && !is_empty(incoming))
    }

    /// Replace every declared field present in `metadata` with its new,
    /// non-empty value.
    ///
    /// Returns `true` if anything changed.
    pub fn overwrite(&mut self, metadata: &Map<String, Value>) -> bool {
        self.apply(metadata, |current, incoming| !is_empty(incoming) && current != incoming)
    }

    /// Fold another payload into this one: list fields are unioned (keeping
    /// this payload's order first) and empty scalar fields are filled.
    pub fn absorb(&mut self, other: &ItemKind) -> bool {
        let incoming = other.to_map();
        let mut current = self.to_map();
        let mut changed = false;
        for (key, value) in current.iter_mut() {
            let Some(theirs) = incoming.get(key) else { continue };
            match (value, theirs) {
                (Value::Array(ours), Value::Array(theirs)) => {
                    for entry in theirs {
                        if !ours.contains(entry) {
                            ours.push(entry.clone());
                            changed = true;
                        }
                    }
                },
                (value, theirs) if is_empty(value) && !is_empty(theirs) => {
                    *value = theirs.clone();
                    changed = true;
                },
                _ => {},
            }
        }
        if changed {
            *self = Self::from_map(self.model(), &current);
        }
        changed
    }

    /// The same data under another variant. Fields the new variant doesn't
    /// declare are dropped; fields it declares but this one lacks start out
    /// empty.
    pub fn recast(&self, model: ItemModel) -> ItemKind {
        Self::from_map(model, &self.to_map())
    }

    fn apply(&mut self, metadata: &Map<String, Value>, accept: impl Fn(&Value, &Value) -> bool) -> bool {
        let mut current = self.to_map();
        let mut changed = false;
        for (key, value) in current.iter_mut() {
            if let Some(incoming) = metadata.get(key)
                && accept(value, incoming)
            {
                *value = incoming.clone();
                changed = true;
            }
        }
        if changed {
            let updated = Self::from_map(self.model(), &current);
            // A value of the wrong shape is dropped by `from_map`, which can
            // leave the payload exactly as it was.
            changed = updated != *self;
            *self = updated;
        }
        changed
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn as_object<T: Serialize>(payload: &T) -> Map<String, Value> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Deserialize a payload, keeping only the declared fields whose values have
/// the right shape.
fn lenient<T>(metadata: &Map<String, Value>) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut accepted = Map::new();
    for key in as_object(&T::default()).into_iter().map(|(key, _)| key) {
        let Some(value) = metadata.get(&key) else { continue };
        accepted.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(accepted.clone())).is_err() {
            tracing::debug!(field = %key, "Dropping metadata field with unexpected shape");
            accepted.remove(&key);
        }
    }
    serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_from_map_keeps_declared_fields_only() {
        let kind = ItemKind::from_map(
            ItemModel::Edition,
            &map(json!({"title": "Dune", "pages": 412, "author": ["Frank Herbert"], "rating": 5})),
        );
        let ItemKind::Edition(edition) = &kind else { panic!("wrong variant") };
        assert_eq!(edition.title, "Dune");
        assert_eq!(edition.pages, Some(412));
        assert_eq!(edition.author, vec!["Frank Herbert"]);
        assert!(!kind.to_map().contains_key("rating"));
    }

    #[test]
    fn test_from_map_drops_misshapen_values() {
        let kind = ItemKind::from_map(
            ItemModel::Edition,
            &map(json!({"title": "Dune", "pages": "lots", "author": "Frank Herbert"})),
        );
        let ItemKind::Edition(edition) = kind else { panic!("wrong variant") };
        assert_eq!(edition.title, "Dune");
        assert_eq!(edition.pages, None);
        assert!(edition.author.is_empty());
    }

    #[rstest]
    #[case::edition(ItemModel::Edition)]
    #[case::tv_show(ItemModel::TVShow)]
    #[case::podcast_episode(ItemModel::PodcastEpisode)]
    #[case::production(ItemModel::PerformanceProduction)]
    fn test_model_tag_matches_variant(#[case] model: ItemModel) {
        assert_eq!(ItemKind::empty(model).model(), model);
        assert_eq!(ItemKind::from_map(model, &Map::new()).model(), model);
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut kind = ItemKind::from_map(ItemModel::Edition, &map(json!({"title": "T"})));
        let changed = kind.fill_missing(&map(json!({"title": "T2", "pages": 100})));
        assert!(changed);
        let ItemKind::Edition(edition) = &kind else { panic!("wrong variant") };
        assert_eq!(edition.title, "T");
        assert_eq!(edition.pages, Some(100));
        assert!(!kind.fill_missing(&map(json!({"title": "T3", "pages": 200}))));
    }

    #[test]
    fn test_overwrite_replaces_present_fields() {
        let mut kind = ItemKind::from_map(ItemModel::Movie, &map(json!({"title": "Old", "year": 1999})));
        assert!(kind.overwrite(&map(json!({"title": "New", "year": null}))));
        let ItemKind::Movie(movie) = kind else { panic!("wrong variant") };
        assert_eq!(movie.title, "New");
        // Empty incoming values don't wipe what we have.
        assert_eq!(movie.year, Some(1999));
    }

    #[test]
    fn test_absorb_unions_lists() {
        let mut target = ItemKind::from_map(ItemModel::Movie, &map(json!({"title": "A", "genre": ["drama"]})));
        let source = ItemKind::from_map(
            ItemModel::Movie,
            &map(json!({"title": "B", "genre": ["drama", "crime"], "year": 1994})),
        );
        assert!(target.absorb(&source));
        let ItemKind::Movie(movie) = target else { panic!("wrong variant") };
        assert_eq!(movie.title, "A");
        assert_eq!(movie.genre, vec!["drama", "crime"]);
        assert_eq!(movie.year, Some(1994));
    }

    #[test]
    fn test_recast_carries_shared_fields() {
        let movie = ItemKind::from_map(
            ItemModel::Movie,
            &map(json!({"title": "Twin Peaks", "director": ["David Lynch"], "duration": "47m"})),
        );
        let show = movie.recast(ItemModel::TVShow);
        assert_eq!(show.model(), ItemModel::TVShow);
        assert_eq!(show.title(), "Twin Peaks");
        let ItemKind::TVShow(show) = show else { panic!("wrong variant") };
        assert_eq!(show.director, vec!["David Lynch"]);
        assert_eq!(show.season_count, None);
    }

    #[test]
    fn test_other_titles() {
        let kind = ItemKind::from_map(ItemModel::Work, &map(json!({"title": "Dune", "other_title": ["Duna"]})));
        assert_eq!(kind.other_titles(), vec!["Duna"]);
        assert!(ItemKind::empty(ItemModel::PodcastEpisode).other_titles().is_empty());
    }
}
