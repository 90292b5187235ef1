use anyhow::{Context, Result};
use qrcode::render::unicode;
use qrcode::QrCode;

/// Render an invitation URL as a terminal QR code.
pub fn render_qr(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes())
        .with_context(|| format!("invitation URL does not fit in a QR code: {url}"))?;

    let image = code
        .render::<unicode::Dense1x2>()
        // colors are inverted for better visibility in dark terminals
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(image)
}

pub fn print_invite(url: &str) -> Result<()> {
    println!("\n{}\n", render_qr(url)?);
    println!("  {}", console::style(url).bold());
    Ok(())
}
