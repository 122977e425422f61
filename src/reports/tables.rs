use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use gyeolgu::extractor::CapturedStroke;
use gyeolgu::grader::EvaluationResult;
use gyeolgu::reference::ReferenceCharacter;
use gyeolgu::store::{EvaluationSession, HistoryStats};
use std::sync::Arc;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn right_align(table: &mut Table, cols: std::ops::RangeInclusive<usize>) {
    for i in cols {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn score_color(v: f64) -> Color {
    if v >= 80.0 {
        Color::Green
    } else if v >= 60.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn evaluation(r: &EvaluationResult) {
    let mut head = new_table();
    head.add_row(vec![
        Cell::new("Character").add_attribute(Attribute::Bold),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Grade").add_attribute(Attribute::Bold),
        Cell::new("Δ"),
        Cell::new("Strokes"),
        Cell::new("Level"),
    ]);
    let delta = r
        .improvement
        .map(|d| format!("{:+.1}", d))
        .unwrap_or_else(|| "-".to_string());
    head.add_row(vec![
        Cell::new(&r.character_id).add_attribute(Attribute::Bold),
        Cell::new(format!("{:.1}", r.final_score)).fg(Color::Cyan),
        Cell::new(&r.grade).add_attribute(Attribute::Bold),
        Cell::new(delta),
        Cell::new(r.stroke_count),
        Cell::new(r.difficulty.label_ko()),
    ]);
    println!("\n{}", head);

    let mut metrics = new_table();
    metrics.add_row(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new("Score"),
        Cell::new("Error"),
    ]);
    right_align(&mut metrics, 2..=3);
    for m in &r.metrics {
        metrics.add_row(vec![
            Cell::new(m.kind),
            Cell::new(m.kind.label_ko()),
            Cell::new(format!("{:.0}", m.value)).fg(score_color(m.value)),
            Cell::new(format!("{:.4}", m.error)),
        ]);
    }
    println!("{}", metrics);

    if !r.tips.is_empty() {
        println!("\n💡 Tips");
        for t in &r.tips {
            println!("  [{}] {} (+{:.0})", t.kind.label_ko(), t.message, t.gain);
        }
    }
}

pub fn strokes(strokes: &[CapturedStroke]) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Points"),
        Cell::new("Ink px"),
        Cell::new("Start"),
        Cell::new("End"),
    ]);
    right_align(&mut table, 1..=2);
    for s in strokes {
        let fmt = |p: Option<&gyeolgu::geometry::Point>| {
            p.map(|p| format!("({:.0}, {:.0})", p.x, p.y))
                .unwrap_or_default()
        };
        table.add_row(vec![
            Cell::new(s.index + 1),
            Cell::new(s.points.len()),
            Cell::new(s.ink_pixels),
            Cell::new(fmt(s.points.first())),
            Cell::new(fmt(s.points.last())),
        ]);
    }
    println!("\n{}", table);
}

pub fn history(sessions: &[EvaluationSession]) {
    if sessions.is_empty() {
        println!("No sessions recorded.");
        return;
    }
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Session").add_attribute(Attribute::Bold),
        Cell::new("When (UTC)"),
        Cell::new("Char"),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Grade"),
        Cell::new("Δ"),
        Cell::new("Image"),
    ]);
    right_align(&mut table, 3..=3);
    for s in sessions {
        let r = &s.result;
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(s.timestamp.format("%Y-%m-%d %H:%M")),
            Cell::new(&r.character_id),
            Cell::new(format!("{:.1}", r.final_score)).fg(score_color(r.final_score)),
            Cell::new(&r.grade),
            Cell::new(
                r.improvement
                    .map(|d| format!("{:+.1}", d))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(&s.image_ref),
        ]);
    }
    println!("\n{}", table);
}

pub fn stats(rows: &[(String, HistoryStats)]) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Char").add_attribute(Attribute::Bold),
        Cell::new("Sessions"),
        Cell::new("Average").fg(Color::Cyan),
        Cell::new("Best").fg(Color::Green),
        Cell::new("Streak (days)"),
    ]);
    right_align(&mut table, 1..=4);
    let opt = |v: Option<f64>| v.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "-".to_string());
    for (name, s) in rows {
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(s.count),
            Cell::new(opt(s.average)).fg(Color::Cyan),
            Cell::new(opt(s.best)).fg(Color::Green),
            Cell::new(s.streak_days),
        ]);
    }
    println!("\n{}", table);
}

pub fn catalog(chars: &[Arc<ReferenceCharacter>]) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Char").add_attribute(Attribute::Bold),
        Cell::new("Name"),
        Cell::new("Strokes"),
        Cell::new("Level"),
    ]);
    right_align(&mut table, 2..=2);
    for c in chars {
        table.add_row(vec![
            Cell::new(&c.id).add_attribute(Attribute::Bold),
            Cell::new(&c.name),
            Cell::new(c.expected_strokes),
            Cell::new(format!("{} ({})", c.difficulty.label_ko(), c.difficulty)),
        ]);
    }
    println!("\n{}", table);
}
