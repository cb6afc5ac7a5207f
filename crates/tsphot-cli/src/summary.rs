use console::Style;
use tsphot_core::photometry::config::PhotometryConfig;
use tsphot_core::photometry::LightCurve;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &PhotometryConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("tsphot Photometry"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(17)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    if let Some(ref png) = config.median_frame_png {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Median PNG"),
            s.path.apply_to(png.display())
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Aperture"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Radius"),
        s.value.apply_to(format!("{:.2} px", config.aperture.radius))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Center"),
        s.method.apply_to(&config.aperture.center)
    );
    if config.recenter.enabled {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Recenter"),
            s.value.apply_to(format!("{} pass(es)", config.recenter.iterations))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Recenter"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!(
        "  {:<14}{}",
        s.header.apply_to("Background"),
        s.method.apply_to(config.background)
    );
    match config.time_range {
        Some(range) => println!(
            "  {:<14}{}",
            s.header.apply_to("Time range"),
            s.value.apply_to(format!("{:.5} .. {:.5}", range.start, range.end))
        ),
        None => println!(
            "  {:<14}{}",
            s.header.apply_to("Time range"),
            s.disabled.apply_to("all epochs")
        ),
    }
    println!();
}

pub fn print_light_curve_summary(curve: &LightCurve) {
    let s = Styles::new();

    let finite: Vec<f64> = curve
        .sap_flux()
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    let degenerate = curve.rows.iter().filter(|r| r.m00.is_nan()).count();

    println!("  {}", s.header.apply_to("Light Curve"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Epochs"),
        s.value.apply_to(curve.len())
    );
    if let Some(median) = curve.median_flux() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Median"),
            s.value.apply_to(format!("{:.3}", median))
        );
    }
    if finite.len() > 1 {
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (finite.len() - 1) as f64;
        let ppm = if mean != 0.0 {
            var.sqrt() / mean.abs() * 1e6
        } else {
            f64::NAN
        };
        println!(
            "    {:<12}{}",
            s.label.apply_to("Scatter"),
            s.value.apply_to(format!("{:.0} ppm", ppm))
        );
    }
    if degenerate > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Degenerate"),
            s.disabled.apply_to(format!("{} epoch(s)", degenerate))
        );
    }
    println!();
}
