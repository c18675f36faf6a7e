//! Body colour names for retail and special-edition controllers.

/// Format a 3-byte body colour as upper-case hex, e.g. `0AB9E6`.
pub fn color_hex(rgb: &[u8]) -> String {
    rgb.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Human name for a body colour hex string, "Unknown" if not in the table.
pub fn color_name(hex: &str) -> &'static str {
    match hex.to_ascii_uppercase().as_str() {
        // Developer kit
        "313131" => "Black",

        // Retail
        "828282" => "Grey",
        "FF3C28" => "Neon Red",
        "0AB9E6" => "Neon Blue",
        "E6FF00" => "Neon Yellow",
        "1EDC00" => "Neon Green",
        "FF3278" => "Neon Pink",
        "E10F00" => "Red",
        "4655F5" => "Blue",
        "B400E6" => "Neon Purple",
        "FAA005" => "Neon Orange",
        "E6E6E6" => "White",
        "FFAFAF" => "Pastel Pink",
        "F5FF82" => "Pastel Yellow",
        "F0CBEB" => "Pastel Purple",
        "BCFFC8" => "Pastel Green",

        // Special editions
        "C88C32" => "Pokemon Let's Go! Eevee",
        "FFDC00" => "Pokemon Let's Go! Pikachu",
        "D7AA73" => "Nintendo Labo Creators Contest Edition",
        "1473FA" => "Dragon Quest XI S Lotto Edition",
        "82FF96" | "96F5F5" => "Animal Crossing: New Horizons",
        "F04614" => "Mario Red x Blue",
        "818282" => "Monster Hunter Rise",
        "0084FF" => "Fortnite Fleet Force",
        "2D50F0" | "500FC8" => "Zelda: Skyward Sword HD",
        "6455F5" | "C3FA05" => "OLED Splatoon 3",
        "F07341" | "9650AA" => "OLED Pokemon Scarlet & Violet",
        "D2BE69" => "OLED Zelda: Tears of the Kingdom",

        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_colors() {
        assert_eq!(color_name(&color_hex(&[0x0A, 0xB9, 0xE6])), "Neon Blue");
        assert_eq!(color_name("ff3c28"), "Neon Red");
        assert_eq!(color_name("123456"), "Unknown");
    }
}
