//! Parser for the archive client's verbose listing.
//!
//! Each listing line looks like `ls -l` output:
//!
//! ```text
//! -rw-r--r--  0 alice  staff   18432 Mar  4 09:15 home/alice/notes.txt
//! drwxr-xr-x  0 alice  staff       0 Dec 31  2023 home/alice/old/
//! ```
//!
//! Field 5 is the size, fields 6-8 the modification date, and everything
//! after that the member name. The date's third field is either a time of
//! day (current year implied) or a year.

use anyhow::Result;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime};

use super::{Entry, Inventory};
use crate::client::{ArchiveClient, ClientProcess, Invocation};
use crate::report::{Diagnostics, Event};

/// Minimum number of whitespace separated fields in a listing line.
const MIN_FIELDS: usize = 9;

/// Run the client in listing mode and build the inventory from its output.
///
/// The scan summary is written to `diagnostics` once the client has exited.
/// Failing to start the client is an error; malformed lines are skipped.
pub async fn scan_archive<C: ArchiveClient + ?Sized>(
    client: &C,
    invocation: &Invocation,
    diagnostics: &Diagnostics,
) -> Result<Inventory> {
    let mut process = client.spawn(invocation).await?;
    let inventory = match read_listing(&mut process, OffsetDateTime::now_utc()).await {
        Ok(inventory) => inventory,
        Err(e) => {
            if let Err(kill_err) = process.kill().await {
                tracing::warn!(error = %kill_err, "Failed to stop listing client");
            }
            return Err(e);
        }
    };

    match process.wait().await {
        Ok(Some(status)) if !status.success() => {
            diagnostics.emit(Event::ListingFailed {
                reason: status.to_string(),
            });
        }
        Ok(_) => {}
        Err(e) => diagnostics.emit(Event::ListingFailed {
            reason: format!("{e:#}"),
        }),
    }

    diagnostics.emit(Event::ScanComplete {
        entries: inventory.len(),
    });
    Ok(inventory)
}

/// Read every line of a listing into an inventory.
pub async fn read_listing(process: &mut ClientProcess, now: OffsetDateTime) -> Result<Inventory> {
    let mut inventory = Inventory::new();
    let mut skipped = 0usize;

    while let Some(line) = process.next_line().await? {
        match parse_line(&line, now) {
            Some(entry) => inventory.insert(entry),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped unparseable listing lines");
    }
    Ok(inventory)
}

/// Parse one listing line.
///
/// Returns `None` for lines with too few fields, a non-numeric size or an
/// unrecognized date.
pub fn parse_line(line: &str, now: OffsetDateTime) -> Option<Entry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    // Sizes are signed 64-bit in the listing format; negative ones are rejected.
    let size = u64::try_from(fields[4].parse::<i64>().ok()?).ok()?;
    let modified_at = parse_timestamp(fields[5], fields[6], fields[7], now)?;
    let name = fields[8..].join(" ");

    Some(Entry {
        name,
        size,
        modified_at,
    })
}

/// Parse the three date fields of a listing line.
///
/// Dates after `now` are taken to be from the previous year, which is what
/// the time-of-day form means around New Year.
pub fn parse_timestamp(
    month: &str,
    day: &str,
    year_or_time: &str,
    now: OffsetDateTime,
) -> Option<OffsetDateTime> {
    let stamp = if year_or_time.contains(':') {
        format!("{month} {day} {} {year_or_time}", now.year())
    } else {
        format!("{month} {day} {year_or_time}")
    };

    let parsed = PrimitiveDateTime::parse(
        &stamp,
        format_description!(
            "[month repr:short case_sensitive:false] [day padding:none] [year] [hour padding:none]:[minute]"
        ),
    )
    .or_else(|_| {
        Date::parse(
            &stamp,
            format_description!(
                "[month repr:short case_sensitive:false] [day padding:none] [year]"
            ),
        )
        .map(Date::midnight)
    })
    .ok()?
    .assume_utc();

    if parsed > now {
        Some(one_year_earlier(parsed))
    } else {
        Some(parsed)
    }
}

/// Move a timestamp back one calendar year; Feb 29 becomes Mar 1.
fn one_year_earlier(at: OffsetDateTime) -> OffsetDateTime {
    let year = at.year() - 1;
    match at.replace_year(year) {
        Ok(shifted) => shifted,
        Err(_) => match Date::from_calendar_date(year, Month::March, 1) {
            Ok(date) => at.replace_date(date),
            Err(_) => at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use time::macros::datetime;
    use tokio::io::{AsyncRead, ReadBuf};

    const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    #[rstest]
    #[case(
        "-rw-r--r--  0 alice  staff   18432 Feb 14 09:15 home/alice/notes.txt",
        "home/alice/notes.txt",
        18432,
        datetime!(2026-02-14 09:15 UTC)
    )]
    #[case(
        "drwxr-xr-x  0 alice  staff       0 Dec 31  2023 home/alice/old/",
        "home/alice/old/",
        0,
        datetime!(2023-12-31 00:00 UTC)
    )]
    #[case(
        "-rw-r--r--  0 alice  staff  7 Jan  2  2020 my   holiday photo.jpg",
        "my holiday photo.jpg",
        7,
        datetime!(2020-01-02 00:00 UTC)
    )]
    #[case(
        "-rw-r--r--  0 alice  staff  5 jan 02 7:05 lower.txt",
        "lower.txt",
        5,
        datetime!(2026-01-02 07:05 UTC)
    )]
    fn test_parse_line(
        #[case] line: &str,
        #[case] name: &str,
        #[case] size: u64,
        #[case] modified_at: OffsetDateTime,
    ) {
        let entry = parse_line(line, NOW).unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(entry.size, size);
        assert_eq!(entry.modified_at, modified_at);
    }

    #[rstest]
    #[case("")]
    #[case("tarsnap: Archive not found")]
    #[case("-rw-r--r-- 0 alice staff 12 Feb 14 09:15")]
    #[case("-rw-r--r-- 0 alice staff twelve Feb 14 09:15 a.txt")]
    #[case("-rw-r--r-- 0 alice staff -12 Feb 14 09:15 a.txt")]
    #[case("-rw-r--r-- 0 alice staff 9223372036854775808 Jan 1 2020 a.txt")]
    #[case("-rw-r--r-- 0 alice staff 18446744073709551615 Jan 1 2020 a.txt")]
    #[case("-rw-r--r-- 0 alice staff 12 Foo 14 09:15 a.txt")]
    #[case("-rw-r--r-- 0 alice staff 12 Feb 30 2024 a.txt")]
    #[case("-rw-r--r-- 0 alice staff 12 Feb 14 9h15 a.txt")]
    fn test_parse_line_rejects_malformed(#[case] line: &str) {
        assert_eq!(parse_line(line, NOW), None);
    }

    #[test]
    fn test_parse_line_accepts_largest_size() {
        let entry = parse_line("-rw-r--r-- 0 a s 9223372036854775807 Jan 1 2020 huge.img", NOW);
        assert_eq!(entry.map(|e| e.size), Some(i64::MAX as u64));
    }

    #[test]
    fn test_time_of_day_in_future_moves_back_one_year() {
        let parsed = parse_timestamp("Dec", "25", "10:30", NOW).unwrap();
        assert_eq!(parsed, datetime!(2025-12-25 10:30 UTC));
    }

    #[test]
    fn test_time_of_day_in_past_is_current_year() {
        let parsed = parse_timestamp("Mar", "1", "11:59", NOW).unwrap();
        assert_eq!(parsed, datetime!(2026-03-01 11:59 UTC));
    }

    #[test]
    fn test_year_form_only_moves_when_after_now() {
        let past = parse_timestamp("Dec", "25", "2025", NOW).unwrap();
        assert_eq!(past, datetime!(2025-12-25 00:00 UTC));

        let future = parse_timestamp("Jun", "1", "2030", NOW).unwrap();
        assert_eq!(future, datetime!(2029-06-01 00:00 UTC));
    }

    #[test]
    fn test_leap_day_moves_to_march_first() {
        let now = datetime!(2024-02-01 00:00 UTC);
        let parsed = parse_timestamp("Feb", "29", "08:00", now).unwrap();
        assert_eq!(parsed, datetime!(2023-03-01 08:00 UTC));
    }

    #[tokio::test]
    async fn test_read_listing_skips_bad_lines() {
        let listing = b"-rw-r--r-- 0 a s 10 Jan 1 2020 one.txt\n\
            garbage line\n\
            drwxr-xr-x 0 a s 0 Jan 1 2020 dir/\n";
        let mut process = ClientProcess::from_reader(&listing[..]);
        let inventory = read_listing(&mut process, NOW).await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.get("one.txt").map(|e| e.size), Some(10));
        assert!(inventory.get("dir/").is_some());
    }

    /// Output stream that fails on the first read.
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    struct BrokenClient;

    #[async_trait]
    impl ArchiveClient for BrokenClient {
        async fn spawn(&self, _invocation: &Invocation) -> Result<ClientProcess> {
            Ok(ClientProcess::from_reader(BrokenPipe))
        }
    }

    #[tokio::test]
    async fn test_scan_archive_read_failure_is_an_error() {
        let invocation = Invocation::List {
            archive: "nightly".to_string(),
            directory: None,
            options: vec![],
        };
        let diagnostics = Diagnostics::new(std::io::sink());
        let err = scan_archive(&BrokenClient, &invocation, &diagnostics)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }
}
