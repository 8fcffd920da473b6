//! Group filtering by minimum signal count

use tracing::debug;

use crate::data::{Frame, Value};
use crate::error::Result;

/// Keep only the groups of `group_key` that hold `value` in `column` at least
/// `min_count` times.
///
/// Groups are kept or dropped whole; surviving rows keep their relative order.
pub fn filter_groups(
    frame: &Frame,
    group_key: &str,
    column: &str,
    value: &Value,
    min_count: usize,
) -> Result<Frame> {
    let groups = frame.group_indices(group_key)?;
    let target = frame.column(column)?;

    let mut keep = vec![false; frame.height()];
    for group in &groups {
        let count = group
            .rows
            .iter()
            .filter(|&&row| target.matches(row, value))
            .count();

        if count >= min_count {
            for &row in &group.rows {
                keep[row] = true;
            }
        } else {
            debug!(group = %group.key, count, min_count, "dropping group");
        }
    }

    let indices: Vec<usize> = (0..frame.height()).filter(|&row| keep[row]).collect();
    Ok(frame.take(&indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::error::Error;

    fn firms(names: &[&str]) -> Column {
        Column::Text(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_filter_drops_short_groups() {
        let frame = Frame::from_columns(vec![
            ("firm", firms(&["APPL", "APPL", "APPL", "GOOG", "GOOG", "GOOG"])),
            ("buy_signal", Column::Int(vec![1, 1, 0, 0, 0, 0])),
        ])
        .unwrap();

        let result = filter_groups(&frame, "firm", "buy_signal", &Value::Int(1), 1).unwrap();

        let expected = Frame::from_columns(vec![
            ("firm", firms(&["APPL", "APPL", "APPL"])),
            ("buy_signal", Column::Int(vec![1, 1, 0])),
        ])
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_filter_threshold_is_inclusive() {
        let frame = Frame::from_columns(vec![
            ("firm", firms(&["A", "A", "B", "B"])),
            ("buy_signal", Column::Float(vec![1.0, 1.0, 1.0, 0.0])),
        ])
        .unwrap();

        let result = filter_groups(&frame, "firm", "buy_signal", &Value::Int(1), 2).unwrap();
        assert_eq!(result.height(), 2);
        assert_eq!(result.floats("buy_signal").unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn test_filter_keeps_interleaved_order() {
        let frame = Frame::from_columns(vec![
            ("firm", firms(&["A", "B", "A", "C", "B"])),
            ("buy_signal", Column::Int(vec![1, 1, 0, 0, 0])),
            ("close", Column::Float(vec![10.0, 20.0, 11.0, 30.0, 21.0])),
        ])
        .unwrap();

        let result = filter_groups(&frame, "firm", "buy_signal", &Value::Int(1), 1).unwrap();
        assert_eq!(result.floats("close").unwrap(), &[10.0, 20.0, 11.0, 21.0]);
    }

    #[test]
    fn test_filter_missing_columns() {
        let frame = Frame::from_columns(vec![("firm", firms(&["A"]))]).unwrap();

        let err = filter_groups(&frame, "ticker", "firm", &Value::Int(1), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidColumn(_)));

        let err = filter_groups(&frame, "firm", "buy_signal", &Value::Int(1), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }
}
