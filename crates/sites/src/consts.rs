use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(ASIN_REGEX, r"^B[A-Z0-9]{9}$");
regex!(IMDB_REGEX, r"^(?:tt|nm)\d{7,}$");
regex!(NUMERIC_REGEX, r"^\d+$");
regex!(HTTP_URL_REGEX, r"^https?://[^/\s?#]+(?:[/?#]\S*)?$");
