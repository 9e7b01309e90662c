use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Characters the upstream sometimes wraps party acronyms in.
const ACRONYM_MARKERS: &[char] = &['*', '-', '.', '_', '(', ')', '"', '\'', '/'];

/// Canonical form of a party acronym: trimmed, marker characters removed
/// from both ends, diacritics folded and uppercased.
pub fn normalize_party_acronym(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c: char| c.is_whitespace() || ACRONYM_MARKERS.contains(&c));
    fold_diacritics(trimmed).to_uppercase()
}

/// Replaces accented Latin letters with their unaccented counterpart.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '«', '»', '`'];

/// Removes quote characters surrounding model output.
pub fn strip_quotes(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| QUOTES.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Splits `text` into pieces of at most `limit` characters, preferring to
/// break on whitespace.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if limit == 0 || text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.chars().count() <= limit {
            chunks.push(rest.to_string());
            break;
        }
        // byte offset of the char right after the limit
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let end = rest[..hard_end]
            .rfind(char::is_whitespace)
            .filter(|&i| i > 0)
            .unwrap_or(hard_end);
        chunks.push(rest[..end].trim().to_string());
        rest = rest[end..].trim_start();
    }
    chunks
}

/// UTC instants bounding the local calendar day `date` as `[start, end)`.
pub fn day_bounds(date: NaiveDate, timezone: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN);
    let start = timezone
        .from_local_datetime(&start)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&start));
    (start, start + Duration::days(1))
}

pub fn local_date(at: DateTime<Utc>, timezone: FixedOffset) -> NaiveDate {
    at.with_timezone(&timezone).date_naive()
}

/// Parses the upstream's zone-less timestamps, which are local time.
pub fn parse_local_datetime(raw: &str, timezone: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;
    timezone
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn party_acronyms_are_normalized() {
        assert_eq!(normalize_party_acronym(" pode* "), "PODE");
        assert_eq!(normalize_party_acronym("-Solidariedade-"), "SOLIDARIEDADE");
        assert_eq!(normalize_party_acronym("União"), "UNIAO");
        assert_eq!(normalize_party_acronym("PCdoB"), "PCDOB");
    }

    #[test]
    fn quotes_are_stripped_from_both_ends() {
        assert_eq!(strip_quotes("\"Reforma tributária\""), "Reforma tributária");
        assert_eq!(strip_quotes("  “Novo marco”\n"), "Novo marco");
        assert_eq!(strip_quotes("Sem aspas"), "Sem aspas");
    }

    #[test]
    fn chunks_respect_the_limit_and_word_boundaries() {
        let text = "um dois três quatro cinco seis";
        let chunks = chunk_text(text, 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.join(" "), text);
        assert_eq!(chunk_text("curto", 10), vec!["curto".to_string()]);
        assert!(chunk_text("   ", 10).is_empty());
    }

    #[test]
    fn day_bounds_follow_the_local_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let (start, end) = day_bounds(date, brt());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 11, 3, 0, 0).unwrap());
    }

    #[test]
    fn zone_less_timestamps_are_local() {
        let parsed = parse_local_datetime("2024-05-10T14:30", brt()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 10, 17, 30, 0).unwrap());
        assert!(parse_local_datetime("ontem", brt()).is_none());
    }
}
