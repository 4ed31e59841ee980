//! Country and dial-code reference table used by the membership form.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub iso2: &'static str,
    pub name: &'static str,
    pub dial: &'static str,
}

pub const DEFAULT_COUNTRY_ISO2: &str = "FR";
pub const DEFAULT_DIAL: &str = "+33";

const fn country(iso2: &'static str, name: &'static str, dial: &'static str) -> Country {
    Country { iso2, name, dial }
}

pub static COUNTRIES: &[Country] = &[
    country("AF", "Afghanistan", "+93"),
    country("AL", "Albania", "+355"),
    country("DZ", "Algeria", "+213"),
    country("AD", "Andorra", "+376"),
    country("AO", "Angola", "+244"),
    country("AR", "Argentina", "+54"),
    country("AM", "Armenia", "+374"),
    country("AU", "Australia", "+61"),
    country("AT", "Austria", "+43"),
    country("AZ", "Azerbaijan", "+994"),
    country("BH", "Bahrain", "+973"),
    country("BD", "Bangladesh", "+880"),
    country("BY", "Belarus", "+375"),
    country("BE", "Belgium", "+32"),
    country("BZ", "Belize", "+501"),
    country("BJ", "Benin", "+229"),
    country("BO", "Bolivia", "+591"),
    country("BA", "Bosnia & Herzegovina", "+387"),
    country("BW", "Botswana", "+267"),
    country("BR", "Brazil", "+55"),
    country("BN", "Brunei", "+673"),
    country("BG", "Bulgaria", "+359"),
    country("BF", "Burkina Faso", "+226"),
    country("BI", "Burundi", "+257"),
    country("KH", "Cambodia", "+855"),
    country("CM", "Cameroon", "+237"),
    country("CA", "Canada", "+1"),
    country("CV", "Cape Verde", "+238"),
    country("CF", "Central African Republic", "+236"),
    country("TD", "Chad", "+235"),
    country("CL", "Chile", "+56"),
    country("CN", "China", "+86"),
    country("CO", "Colombia", "+57"),
    country("KM", "Comoros", "+269"),
    country("CG", "Congo", "+242"),
    country("CR", "Costa Rica", "+506"),
    country("CI", "Côte d’Ivoire", "+225"),
    country("HR", "Croatia", "+385"),
    country("CU", "Cuba", "+53"),
    country("CY", "Cyprus", "+357"),
    country("CZ", "Czechia", "+420"),
    country("DK", "Denmark", "+45"),
    country("DJ", "Djibouti", "+253"),
    country("DO", "Dominican Republic", "+1"),
    country("EC", "Ecuador", "+593"),
    country("EG", "Egypt", "+20"),
    country("SV", "El Salvador", "+503"),
    country("GQ", "Equatorial Guinea", "+240"),
    country("ER", "Eritrea", "+291"),
    country("EE", "Estonia", "+372"),
    country("ET", "Ethiopia", "+251"),
    country("FI", "Finland", "+358"),
    country("FR", "France", "+33"),
    country("GA", "Gabon", "+241"),
    country("GM", "Gambia", "+220"),
    country("GE", "Georgia", "+995"),
    country("DE", "Germany", "+49"),
    country("GH", "Ghana", "+233"),
    country("GR", "Greece", "+30"),
    country("GT", "Guatemala", "+502"),
    country("GN", "Guinea", "+224"),
    country("GW", "Guinea-Bissau", "+245"),
    country("HT", "Haiti", "+509"),
    country("HN", "Honduras", "+504"),
    country("HK", "Hong Kong", "+852"),
    country("HU", "Hungary", "+36"),
    country("IS", "Iceland", "+354"),
    country("IN", "India", "+91"),
    country("ID", "Indonesia", "+62"),
    country("IR", "Iran", "+98"),
    country("IQ", "Iraq", "+964"),
    country("IE", "Ireland", "+353"),
    country("IL", "Israel", "+972"),
    country("IT", "Italy", "+39"),
    country("JP", "Japan", "+81"),
    country("JO", "Jordan", "+962"),
    country("KZ", "Kazakhstan", "+7"),
    country("KE", "Kenya", "+254"),
    country("KW", "Kuwait", "+965"),
    country("KG", "Kyrgyzstan", "+996"),
    country("LA", "Laos", "+856"),
    country("LV", "Latvia", "+371"),
    country("LB", "Lebanon", "+961"),
    country("LY", "Libya", "+218"),
    country("LI", "Liechtenstein", "+423"),
    country("LT", "Lithuania", "+370"),
    country("LU", "Luxembourg", "+352"),
    country("MY", "Malaysia", "+60"),
    country("MV", "Maldives", "+960"),
    country("ML", "Mali", "+223"),
    country("MT", "Malta", "+356"),
    country("MR", "Mauritania", "+222"),
    country("MU", "Mauritius", "+230"),
    country("MX", "Mexico", "+52"),
    country("MD", "Moldova", "+373"),
    country("MC", "Monaco", "+377"),
    country("MN", "Mongolia", "+976"),
    country("ME", "Montenegro", "+382"),
    country("MA", "Morocco", "+212"),
    country("MZ", "Mozambique", "+258"),
    country("MM", "Myanmar", "+95"),
    country("NA", "Namibia", "+264"),
    country("NP", "Nepal", "+977"),
    country("NL", "Netherlands", "+31"),
    country("NZ", "New Zealand", "+64"),
    country("NI", "Nicaragua", "+505"),
    country("NE", "Niger", "+227"),
    country("NG", "Nigeria", "+234"),
    country("NO", "Norway", "+47"),
    country("OM", "Oman", "+968"),
    country("PK", "Pakistan", "+92"),
    country("PA", "Panama", "+507"),
    country("PY", "Paraguay", "+595"),
    country("PE", "Peru", "+51"),
    country("PH", "Philippines", "+63"),
    country("PL", "Poland", "+48"),
    country("PT", "Portugal", "+351"),
    country("QA", "Qatar", "+974"),
    country("RO", "Romania", "+40"),
    country("RU", "Russia", "+7"),
    country("SA", "Saudi Arabia", "+966"),
    country("SN", "Senegal", "+221"),
    country("RS", "Serbia", "+381"),
    country("SG", "Singapore", "+65"),
    country("SK", "Slovakia", "+421"),
    country("SI", "Slovenia", "+386"),
    country("SO", "Somalia", "+252"),
    country("ZA", "South Africa", "+27"),
    country("KR", "South Korea", "+82"),
    country("ES", "Spain", "+34"),
    country("LK", "Sri Lanka", "+94"),
    country("SE", "Sweden", "+46"),
    country("CH", "Switzerland", "+41"),
    country("SY", "Syria", "+963"),
    country("TW", "Taiwan", "+886"),
    country("TH", "Thailand", "+66"),
    country("TN", "Tunisia", "+216"),
    country("TR", "Turkey", "+90"),
    country("UA", "Ukraine", "+380"),
    country("AE", "United Arab Emirates", "+971"),
    country("GB", "United Kingdom", "+44"),
    country("US", "United States", "+1"),
    country("YE", "Yemen", "+967"),
];

/// Regional-indicator flag for a two letter code, white flag otherwise.
pub fn flag_emoji(iso2: &str) -> String {
    let code = iso2.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return String::from("🏳️");
    }

    code.bytes()
        .filter_map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}

pub fn country_by_iso2(iso2: &str) -> Option<&'static Country> {
    let code = iso2.trim();
    COUNTRIES
        .iter()
        .find(|country| country.iso2.eq_ignore_ascii_case(code))
}

/// First country listed for each dial code, ordered by the dial string.
pub fn unique_dial_countries() -> Vec<&'static Country> {
    let mut seen: HashMap<&str, &'static Country> = HashMap::new();
    for country in COUNTRIES {
        seen.entry(country.dial).or_insert(country);
    }

    let mut countries = seen.into_values().collect::<Vec<_>>();
    countries.sort_by(|a, b| a.dial.cmp(b.dial));
    countries
}

pub fn is_known_dial(dial: &str) -> bool {
    let dial = dial.trim();
    COUNTRIES.iter().any(|country| country.dial == dial)
}

/// Dial code to prefill for a country, falling back to France.
pub fn default_dial_for(iso2: &str) -> &'static str {
    country_by_iso2(iso2).map_or(DEFAULT_DIAL, |country| country.dial)
}
