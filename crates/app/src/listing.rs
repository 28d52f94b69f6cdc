//! Listing table for the `prices` command.

use std::io;

use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use vitrine::money::format_minor;

use crate::domain::pricing::data::{ListingEntry, SizeAvailability};

/// Write `entries` as a table, one row per product.
///
/// # Errors
///
/// Returns the writer's error.
pub fn write_listing(out: &mut impl io::Write, entries: &[ListingEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "nothing listed");
    }

    let mut builder = Builder::default();

    builder.push_record(["Product", "Category", "Full price", "Price", "Off", "Source", "Sizes"]);

    for entry in entries {
        builder.push_record([
            entry.product.name.clone(),
            entry.product.category.clone().unwrap_or_default(),
            format_minor(entry.quote.original_price),
            format_minor(entry.quote.effective_price),
            format!("{}%", entry.quote.discount_percent),
            entry.quote.discount_source.label().to_string(),
            sizes(&entry.sizes),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "{table}")
}

/// `P:4 M:1! G:0!`, where `!` flags low stock.
fn sizes(sizes: &[SizeAvailability]) -> String {
    sizes
        .iter()
        .map(|size| {
            let flag = if size.low_stock { "!" } else { "" };

            format!("{}:{}{flag}", size.size, size.available)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;
    use vitrine::{channel::Channel, stock::Size};

    use super::*;
    use crate::test::TestContext;

    #[tokio::test]
    async fn listing_shows_prices_and_sizes() -> TestResult {
        let ctx = TestContext::new();

        ctx.product("Vestido Midi", 25_990, &[("P", 1), ("M", 6)]).await?;

        let entries = ctx.pricing.list(Channel::Catalog).await?;
        let mut out = Vec::new();

        write_listing(&mut out, &entries)?;

        let table = String::from_utf8(out)?;

        assert!(table.contains("Vestido Midi"), "missing product in {table}");
        assert!(table.contains(&format_minor(25_990)), "missing price in {table}");
        assert!(table.contains("M:6"), "missing size in {table}");

        Ok(())
    }

    #[test]
    fn low_stock_sizes_are_flagged() {
        let line = sizes(&[
            SizeAvailability {
                size: Size::new("p"),
                available: 1,
                low_stock: true,
            },
            SizeAvailability {
                size: Size::new("G"),
                available: 9,
                low_stock: false,
            },
        ]);

        assert_eq!(line, "P:1! G:9");
    }

    #[test]
    fn empty_listing_says_so() -> TestResult {
        let mut out = Vec::new();

        write_listing(&mut out, &[])?;

        assert_eq!(String::from_utf8(out)?, "nothing listed\n");

        Ok(())
    }
}
