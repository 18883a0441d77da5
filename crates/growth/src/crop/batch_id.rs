use chrono::{DateTime, Utc};

/// Derives a human-readable batch ID from a material name and a date.
///
/// Every word of the name contributes its first three characters, and the
/// date is appended as day-of-month plus abbreviated month:
/// `"Tomato Super One"` seeded on 25 January becomes `tom-sup-one-25jan`.
pub fn generate_batch_id(material_name: &str, date: DateTime<Utc>) -> String {
    let mut parts: Vec<String> = material_name
        .split_whitespace()
        .map(|word| word.chars().take(3).collect::<String>().to_lowercase())
        .collect();
    parts.push(date.format("%-d%b").to_string().to_lowercase());
    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn takes_three_letters_of_each_word() {
        let date = Utc.with_ymd_and_hms(2024, 1, 25, 9, 0, 0).unwrap();
        assert_eq!(generate_batch_id("Tomato Super One", date), "tom-sup-one-25jan");
    }

    #[test]
    fn short_words_and_single_digit_days() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap();
        assert_eq!(generate_batch_id("Pak  Choi", date), "pak-cho-5mar");
        assert_eq!(generate_batch_id("Ok", date), "ok-5mar");
    }
}
