#[test]
fn compositor_wgsl_sources_parse_successfully() {
    parse_wgsl("compositor.wgsl", include_str!("compositor.wgsl"));
    parse_wgsl("gradient.wgsl", include_str!("gradient.wgsl"));
    parse_wgsl("outline.wgsl", include_str!("outline.wgsl"));
}

fn parse_wgsl(label: &str, source: &str) {
    naga::front::wgsl::parse_str(source).unwrap_or_else(|error| {
        panic!(
            "WGSL parse failed for {label}: {}",
            error.emit_to_string(source)
        )
    });
}
