//! Points awarded per completion and the statistics shown for a task's
//! history.

use crate::task::CompletionRecord;

/// Five points for an on-time completion, stepping down to a floor of one.
pub fn points(missed_count_at_completion: u32) -> u32 {
    match missed_count_at_completion {
        0 => 5,
        1..=2 => 4,
        3..=4 => 3,
        5..=6 => 2,
        _ => 1,
    }
}

pub fn total_points(history: &[CompletionRecord]) -> u32 {
    history.iter().map(CompletionRecord::points).sum()
}

pub fn average_points(history: &[CompletionRecord]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    f64::from(total_points(history)) / history.len() as f64
}

pub fn average_missed_count(history: &[CompletionRecord]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let total: u64 = history
        .iter()
        .map(|record| u64::from(record.missed_count_at_completion))
        .sum();
    total as f64 / history.len() as f64
}

/// Share of completions made with nothing missed.
pub fn on_time_rate(history: &[CompletionRecord]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let on_time = history
        .iter()
        .filter(|record| record.missed_count_at_completion == 0)
        .count();
    on_time as f64 / history.len() as f64
}

pub fn newest_first(history: &[CompletionRecord]) -> Vec<&CompletionRecord> {
    let mut sorted: Vec<&CompletionRecord> = history.iter().collect();
    sorted.sort_by(|a, b| b.completion_date.cmp(&a.completion_date));
    sorted
}
