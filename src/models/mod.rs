pub mod click;
pub mod url;

pub use click::{ClickProperties, ClickRecord, ClickStats};
pub use url::{
    present_or_default, Redirection, ShortUrlMapping, ShortUrlProperties, ShortUrlRow,
    ValidationStatus, Verdict,
};
