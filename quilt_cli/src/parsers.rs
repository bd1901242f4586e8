use jiff::SpanRelativeTo;

pub fn parse_duration(input: &str) -> Result<jiff::SignedDuration, String> {
    if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        return Ok(duration);
    }

    if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        return Ok(duration);
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(jiff::SignedDuration::from_secs(seconds.abs()));
    }

    Err(String::from("Invalid duration"))
}

/// Bounding box as `min_lon,min_lat,max_lon,max_lat`.
pub fn parse_bbox(input: &str) -> Result<[f64; 4], String> {
    let values = input
        .split(',')
        .map(|value| value.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("Invalid bounding box: {error}"))?;

    let [min_lon, min_lat, max_lon, max_lat]: [f64; 4] = values
        .try_into()
        .map_err(|_| String::from("Bounding box needs 4 values"))?;

    if min_lon >= max_lon || min_lat >= max_lat {
        return Err(String::from("Bounding box minimum must be below its maximum"));
    }

    Ok([min_lon, min_lat, max_lon, max_lat])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("30s").unwrap(),
            jiff::SignedDuration::from_secs(30)
        );
        assert_eq!(
            parse_duration("PT1M30S").unwrap(),
            jiff::SignedDuration::from_secs(90)
        );
        assert_eq!(
            parse_duration("45").unwrap(),
            jiff::SignedDuration::from_secs(45)
        );
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("13.08, 52.33, 13.76, 52.67").unwrap(),
            [13.08, 52.33, 13.76, 52.67]
        );
        assert!(parse_bbox("13.08,52.33,13.76").is_err());
        assert!(parse_bbox("13.76,52.33,13.08,52.67").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}
