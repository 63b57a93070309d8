use console::Style;

use lumen_core::pipeline::types::{FallbackReason, PipelineResult};

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    good: Style,
    bad: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            good: Style::new().green(),
            bad: Style::new().yellow(),
        }
    }
}

pub fn print_result_summary(result: &PipelineResult) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Lumen Result"));
    println!("  {}", s.title.apply_to("════════════"));
    println!(
        "  {:<18}{}",
        s.label.apply_to("Input"),
        s.value
            .apply_to(format!("{}x{}", result.input_width, result.input_height))
    );
    println!(
        "  {:<18}{}",
        s.label.apply_to("Output"),
        s.value
            .apply_to(format!("{}x{}", result.output_width, result.output_height))
    );
    println!(
        "  {:<18}{}",
        s.label.apply_to("Frames used"),
        s.value.apply_to(result.frames_used)
    );

    if result.tiles_processed > 0 || result.tiles_failed > 0 {
        println!(
            "  {:<18}{} processed, {} failed",
            s.label.apply_to("Tiles"),
            s.value.apply_to(result.tiles_processed),
            s.value.apply_to(result.tiles_failed)
        );
        println!(
            "  {:<18}{}",
            s.label.apply_to("Average flow"),
            s.value.apply_to(format!("{:.2} px", result.average_flow))
        );
        println!(
            "  {:<18}{}",
            s.label.apply_to("Coverage"),
            s.value
                .apply_to(format!("{:.1}%", result.coverage * 100.0))
        );
    }

    if result.used_fallback {
        println!(
            "  {:<18}{}",
            s.label.apply_to("Fallback"),
            s.bad.apply_to(&result.fallback_reason)
        );
    } else if result.fallback_reason == FallbackReason::None && result.success {
        println!("  {:<18}{}", s.label.apply_to("Status"), s.good.apply_to("ok"));
    }

    if result.sanitized_pixels > 0 {
        println!(
            "  {:<18}{}",
            s.label.apply_to("Sanitized"),
            s.bad.apply_to(format!("{} values", result.sanitized_pixels))
        );
    }
    println!();
}
