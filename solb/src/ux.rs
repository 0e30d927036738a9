use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use crossterm::style::{style, Color, Stylize};

#[must_use]
pub fn new_table<I, S>(head: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            head.into_iter()
                .map(|h| Cell::new(h.to_string()).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

pub fn print_one_column_table<'a, I>(head: &str, items: I)
where
    I: IntoIterator<Item = &'a str>,
{
    let items: Vec<&str> = items.into_iter().collect();
    if items.is_empty() {
        return;
    }
    let mut table = new_table([head]);
    for item in items {
        table.add_row(vec![item]);
    }
    println!("{table}");
    println!();
}

pub fn print_solution_path(path: &str) {
    let path = style(path)
        .with(Color::Rgb {
            r: 0xAA,
            g: 0xAA,
            b: 0xAA,
        })
        .bold();
    println!(" {path}");
}

pub fn print_warning(text: &str) {
    println!(" {}", text.yellow());
}

pub fn print_problem(text: &str) {
    println!(" {}", text.red());
}
