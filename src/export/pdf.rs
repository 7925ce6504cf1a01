//! PDF rendering for quotations and orders.
//!
//! Output depends only on the arguments: no clock reads, no random ids,
//! objects written in id order. Coordinates are whole points on an A4 page.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::logo::LogoRaster;
use super::ExportError;
use crate::common::{
    format_date, format_decimal, format_money, format_optional_date, format_timestamp,
    format_weight,
};
use crate::models::{CompanyProfile, Order, Quotation};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 40;
const ROW_HEIGHT: i64 = 16;
const FIRST_TABLE_TOP: i64 = 640;
const NEXT_TABLE_TOP: i64 = 770;
const TABLE_BOTTOM: i64 = 80;
const TOTALS_ROWS: usize = 5;
const LOGO_BOX: (u32, u32) = (120, 60);

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

struct TableColumn {
    title: &'static str,
    x: i64,
    width: i64,
    align: Align,
}

/// Everything that differs between a quotation and an order PDF
struct Layout {
    title: String,
    subject_lines: Vec<(String, String)>,
    columns: Vec<TableColumn>,
    rows: Vec<Vec<String>>,
    totals: Vec<(String, String, bool)>,
    notes: Option<String>,
}

/// Renders a quotation with prices, taxes and totals.
pub fn render_quotation(
    quotation: &Quotation,
    profile: &CompanyProfile,
    currency: &str,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    let mut subject_lines = vec![
        ("Number".to_string(), quotation.display_number()),
        ("Date".to_string(), format_date(quotation.created_at.date_naive())),
        ("Customer".to_string(), quotation.customer_name.clone()),
    ];
    if let Some(reference) = &quotation.customer_reference {
        subject_lines.push(("Reference".to_string(), reference.clone()));
    }
    if let Some(valid_until) = quotation.valid_until {
        subject_lines.push(("Valid until".to_string(), format_date(valid_until)));
    }

    let rows = quotation
        .items
        .iter()
        .map(|item| {
            vec![
                item.code.clone(),
                item.description.clone(),
                format_quantity(item.quantity),
                format_decimal(item.unit_price, 2),
                format!("{}%", format_quantity(item.tax_rate)),
                format_decimal(item.amount(), 2),
            ]
        })
        .collect();

    let totals = &quotation.totals;
    let layout = Layout {
        title: "QUOTATION".to_string(),
        subject_lines,
        columns: vec![
            col("Code", 40, 70, Align::Left),
            col("Description", 115, 200, Align::Left),
            col("Qty", 320, 45, Align::Right),
            col("Unit price", 370, 65, Align::Right),
            col("Tax", 440, 40, Align::Right),
            col("Amount", 485, 70, Align::Right),
        ],
        rows,
        totals: vec![
            ("Subtotal".into(), format_money(totals.subtotal, currency), false),
            ("Tax".into(), format_money(totals.tax, currency), false),
            ("Total".into(), format_money(totals.total, currency), true),
            ("Total weight".into(), format_weight(totals.total_weight), false),
        ],
        notes: quotation.notes.clone(),
    };

    render(&layout, profile, &quotation.display_number(), generated_at)
}

/// Renders an order as a production sheet: quantities, weights and progress.
pub fn render_order(
    order: &Order,
    profile: &CompanyProfile,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    let mut subject_lines = vec![
        ("Order".to_string(), order.order_number.clone()),
        ("Customer".to_string(), order.customer_name.clone()),
        ("Status".to_string(), order.status.label().to_string()),
        ("Start".to_string(), format_optional_date(order.start_date)),
        ("Delivery".to_string(), format_optional_date(order.delivery_date)),
    ];
    if let Some(internal) = &order.internal_number {
        subject_lines.insert(1, ("Internal no.".to_string(), internal.clone()));
    }

    let rows = order
        .items
        .iter()
        .map(|item| {
            vec![
                item.code.clone(),
                item.description.clone(),
                format_quantity(item.quantity),
                format_weight(item.unit_weight),
                format_weight(item.total_weight()),
                format!("{}%", item.overall_progress()),
            ]
        })
        .collect();

    let layout = Layout {
        title: "PRODUCTION ORDER".to_string(),
        subject_lines,
        columns: vec![
            col("Code", 40, 70, Align::Left),
            col("Description", 115, 185, Align::Left),
            col("Qty", 305, 45, Align::Right),
            col("Unit weight", 355, 70, Align::Right),
            col("Weight", 430, 70, Align::Right),
            col("Progress", 505, 50, Align::Right),
        ],
        rows,
        totals: vec![
            ("Total weight".into(), format_weight(order.total_weight()), true),
            ("Progress".into(), format!("{}%", order.progress()), false),
        ],
        notes: order.notes.clone(),
    };

    render(&layout, profile, &order.order_number, generated_at)
}

fn col(title: &'static str, x: i64, width: i64, align: Align) -> TableColumn {
    TableColumn {
        title,
        x,
        width,
        align,
    }
}

fn format_quantity(value: Decimal) -> String {
    let places = value.normalize().scale().min(3);
    format_decimal(value, places)
}

/// Splits rows into pages. The last page always keeps room for the totals.
fn paginate(row_count: usize) -> Vec<std::ops::Range<usize>> {
    let first = ((FIRST_TABLE_TOP - TABLE_BOTTOM) / ROW_HEIGHT) as usize - 1;
    let next = ((NEXT_TABLE_TOP - TABLE_BOTTOM) / ROW_HEIGHT) as usize - 1;

    let mut pages = Vec::new();
    let mut start = 0;
    let mut capacity = first;
    loop {
        let end = (start + capacity).min(row_count);
        pages.push(start..end);
        if end == row_count {
            if end - start + TOTALS_ROWS > capacity {
                pages.push(end..end);
            }
            break;
        }
        start = end;
        capacity = next;
    }
    pages
}

fn render(
    layout: &Layout,
    profile: &CompanyProfile,
    number: &str,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(font("Helvetica"));
    let bold = doc.add_object(font("Helvetica-Bold"));

    let logo = match profile.logo.as_deref().map(LogoRaster::from_data_url) {
        Some(Ok(raster)) if raster.width > 0 && raster.height > 0 => Some(raster),
        Some(Err(e)) => {
            warn!(error = %e, "Company logo could not be decoded; rendering without it");
            None
        }
        _ => None,
    };

    let mut resources = dictionary! {
        "Font" => dictionary! {
            REGULAR => regular,
            BOLD => bold,
        },
    };
    if let Some(raster) = &logo {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(raster.width),
                "Height" => i64::from(raster.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            raster.rgb.clone(),
        );
        let image_id = doc.add_object(image);
        resources.set("XObject", dictionary! { "Im1" => image_id });
    }
    let resources_id = doc.add_object(resources);

    let pages = paginate(layout.rows.len());
    let page_count = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);

    for (index, range) in pages.iter().enumerate() {
        let mut ops = PageWriter::default();
        let first = index == 0;
        let last = index + 1 == page_count;

        let table_top = if first {
            draw_header(&mut ops, layout, profile, logo.as_ref());
            FIRST_TABLE_TOP
        } else {
            ops.text(
                BOLD,
                11,
                MARGIN,
                PAGE_HEIGHT - MARGIN - 12,
                &format!("{} {} (continued)", layout.title, number),
            );
            NEXT_TABLE_TOP
        };

        let mut y = draw_table_header(&mut ops, &layout.columns, table_top);
        for row in &layout.rows[range.clone()] {
            y -= ROW_HEIGHT;
            for (column, cell) in layout.columns.iter().zip(row) {
                ops.cell(REGULAR, 9, column, y, cell);
            }
        }

        if last {
            draw_totals(&mut ops, layout, y - ROW_HEIGHT);
        }
        draw_footer(&mut ops, index + 1, page_count, generated_at);

        let content = Content {
            operations: ops.finish(),
        };
        let bytes = content
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![int(0), int(0), int(PAGE_WIDTH), int(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(win_ansi(&format!("{} {}", layout.title, number)), StringFormat::Literal),
        "Producer" => Object::string_literal("shopfloor-api"),
        "CreationDate" => Object::string_literal(generated_at.format("D:%Y%m%d%H%M%SZ").to_string()),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    debug!(pages = page_count, bytes = out.len(), "PDF rendered");
    Ok(out)
}

fn int(value: i64) -> Object {
    Object::Integer(value)
}

fn font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn draw_header(
    ops: &mut PageWriter,
    layout: &Layout,
    profile: &CompanyProfile,
    logo: Option<&LogoRaster>,
) {
    let top = PAGE_HEIGHT - MARGIN;
    let mut company_x = MARGIN;
    if let Some(raster) = logo {
        let (w, h) = raster.fit_within(LOGO_BOX.0, LOGO_BOX.1);
        ops.image("Im1", MARGIN, top - i64::from(h), i64::from(w), i64::from(h));
        company_x = MARGIN + i64::from(LOGO_BOX.0) + 10;
    }

    let mut y = top - 12;
    ops.text(BOLD, 12, company_x, y, &profile.name);
    let details = [
        profile.address.as_deref(),
        profile.vat_number.as_deref().map(|v| format!("VAT {}", v)).as_deref(),
        profile.email.as_deref(),
        profile.phone.as_deref(),
        profile.website.as_deref(),
    ]
    .iter()
    .flatten()
    .map(|s| s.to_string())
    .collect::<Vec<_>>();
    for line in details {
        y -= 11;
        ops.text(REGULAR, 8, company_x, y, &line);
    }

    let right = PAGE_WIDTH - MARGIN;
    ops.text_right(BOLD, 16, right, top - 16, &layout.title);

    let mut y = top - 100;
    for (label, value) in &layout.subject_lines {
        ops.text(BOLD, 9, MARGIN, y, &format!("{}:", label));
        ops.text(REGULAR, 9, MARGIN + 75, y, value);
        y -= 13;
    }
}

/// Returns the baseline of the header row.
fn draw_table_header(ops: &mut PageWriter, columns: &[TableColumn], top: i64) -> i64 {
    let y = top - 12;
    for column in columns {
        ops.cell(BOLD, 9, column, y, column.title);
    }
    ops.line(MARGIN, y - 4, PAGE_WIDTH - MARGIN, y - 4);
    y
}

fn draw_totals(ops: &mut PageWriter, layout: &Layout, top: i64) {
    let right = PAGE_WIDTH - MARGIN;
    ops.line(350, top + 8, right, top + 8);
    let mut y = top - 6;
    for (label, value, strong) in &layout.totals {
        let font = if *strong { BOLD } else { REGULAR };
        ops.text(font, 10, 360, y, label);
        ops.text_right(font, 10, right, y, value);
        y -= 14;
    }
    if let Some(notes) = &layout.notes {
        let first_line = notes.lines().next().unwrap_or_default();
        ops.text(REGULAR, 8, MARGIN, y - 6, &truncate(first_line, 8, right - MARGIN));
    }
}

fn draw_footer(ops: &mut PageWriter, page: usize, pages: usize, generated_at: DateTime<Utc>) {
    let y = 30;
    ops.line(MARGIN, y + 12, PAGE_WIDTH - MARGIN, y + 12);
    ops.text(
        REGULAR,
        8,
        MARGIN,
        y,
        &format!("Generated {}", format_timestamp(generated_at)),
    );
    ops.text_right(
        REGULAR,
        8,
        PAGE_WIDTH - MARGIN,
        y,
        &format!("Page {} of {}", page, pages),
    );
}

/// Content stream builder
#[derive(Default)]
struct PageWriter {
    ops: Vec<Operation>,
}

impl PageWriter {
    fn finish(self) -> Vec<Operation> {
        self.ops
    }

    fn text(&mut self, font: &str, size: i64, x: i64, y: i64, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), int(size)],
        ));
        self.ops
            .push(Operation::new("Td", vec![int(x), int(y)]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn text_right(&mut self, font: &str, size: i64, right: i64, y: i64, text: &str) {
        let width = text_width(text, size, font == BOLD);
        self.text(font, size, right - width, y, text);
    }

    fn cell(&mut self, font: &str, size: i64, column: &TableColumn, y: i64, text: &str) {
        let fitted = truncate(text, size, column.width);
        match column.align {
            Align::Left => self.text(font, size, column.x, y, &fitted),
            Align::Right => self.text_right(font, size, column.x + column.width, y, &fitted),
        }
    }

    fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        self.ops.push(Operation::new("w", vec![int(1)]));
        self.ops.push(Operation::new("m", vec![int(x1), int(y1)]));
        self.ops.push(Operation::new("l", vec![int(x2), int(y2)]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn image(&mut self, name: &str, x: i64, y: i64, width: i64, height: i64) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![int(width), int(0), int(0), int(height), int(x), int(y)],
        ));
        self.ops.push(Operation::new(
            "Do",
            vec![Object::Name(name.as_bytes().to_vec())],
        ));
        self.ops.push(Operation::new("Q", vec![]));
    }
}

/// Approximate Helvetica advance width in thousandths of the font size.
fn glyph_width(c: char, bold: bool) -> i64 {
    let base = match c {
        ' ' | '.' | ',' | ':' | ';' | '!' | '|' | 'i' | 'j' | 'l' | '\'' => 278,
        'f' | 't' | 'I' | '/' | '(' | ')' | '-' | '[' | ']' => 333,
        'r' => 333,
        '0'..='9' | '$' | '?' => 556,
        'm' | 'M' | 'W' => 833,
        'w' | '%' => 889,
        'A'..='Z' => 667,
        _ => 556,
    };
    if bold {
        base + base / 12
    } else {
        base
    }
}

/// Width of `text` in points at `size`.
fn text_width(text: &str, size: i64, bold: bool) -> i64 {
    let thousandths: i64 = text.chars().map(|c| glyph_width(c, bold)).sum();
    (thousandths * size + 999) / 1000
}

/// Cuts `text` so it fits in `width` points, marking the cut with "...".
fn truncate(text: &str, size: i64, width: i64) -> String {
    if text_width(text, size, false) <= width {
        return text.to_string();
    }
    let budget = width - text_width("...", size, false);
    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width(&out, size, false) > budget {
            out.pop();
            break;
        }
    }
    out.push_str("...");
    out
}

/// Encodes text for the standard fonts' WinAnsi encoding; anything the
/// encoding cannot represent becomes `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
