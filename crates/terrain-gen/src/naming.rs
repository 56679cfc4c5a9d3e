//! Random place-like map names.

use fake::Fake;
use fake::faker::address::en::CityName;
use rand::Rng;

/// Draws a city-style name and turns it into a file-safe slug, e.g. `"port-ellaview"`.
pub fn random_map_name(rng: &mut impl Rng) -> String {
    let name: String = CityName().fake_with_rng(rng);
    let slug = slugify(&name);
    if slug.is_empty() {
        format!("terrain-{}", rng.gen_range(1000..10000))
    } else {
        slug
    }
}

/// Lowercases, keeps ASCII alphanumerics and collapses everything else into single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
