use chrono::NaiveDate;
use regex::Regex;

/// Publish-date sniffing over a handful of textual patterns.
pub(crate) struct DateFinder {
    month_name: Regex,
    iso: Regex,
    us_numeric: Regex,
}

impl DateFinder {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            month_name: Regex::new(
                r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
            )?,
            iso: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:\b|T)")?,
            us_numeric: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")?,
        })
    }

    /// First valid calendar date found, trying the patterns in order of
    /// how unambiguous they are.
    pub(crate) fn find(&self, text: &str) -> Option<NaiveDate> {
        self.find_month_name(text)
            .or_else(|| self.find_iso(text))
            .or_else(|| self.find_us_numeric(text))
    }

    fn find_month_name(&self, text: &str) -> Option<NaiveDate> {
        self.month_name.captures_iter(text).find_map(|caps| {
            let month = month_number(caps.get(1)?.as_str())?;
            let day = caps.get(2)?.as_str().parse().ok()?;
            let year = caps.get(3)?.as_str().parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    }

    fn find_iso(&self, text: &str) -> Option<NaiveDate> {
        self.iso.captures_iter(text).find_map(|caps| {
            let year = caps.get(1)?.as_str().parse().ok()?;
            let month = caps.get(2)?.as_str().parse().ok()?;
            let day = caps.get(3)?.as_str().parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    }

    fn find_us_numeric(&self, text: &str) -> Option<NaiveDate> {
        self.us_numeric.captures_iter(text).find_map(|caps| {
            let month = caps.get(1)?.as_str().parse().ok()?;
            let day = caps.get(2)?.as_str().parse().ok()?;
            let year = caps.get(3)?.as_str().parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    }
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
