//! C1 — country-code resolver. Maps free-text country names, as they
//! appear across eight differently-shaped sanctions feeds, to ISO-3166
//! alpha-2. Grounded in the teacher's `parser_ofac.rs::country_to_iso`
//! partial table, generalised into one shared lookup every adapter and
//! the normaliser funnel through.

/// `(name, iso2)` pairs. Names are matched case-insensitively after
/// whitespace normalisation; several common historical/alternate
/// spellings are included because they appear verbatim across the
/// eight source feeds.
const COUNTRIES: &[(&str, &str)] = &[
    ("afghanistan", "AF"), ("albania", "AL"), ("algeria", "DZ"), ("andorra", "AD"),
    ("angola", "AO"), ("antigua and barbuda", "AG"), ("argentina", "AR"), ("armenia", "AM"),
    ("australia", "AU"), ("austria", "AT"), ("azerbaijan", "AZ"), ("bahamas", "BS"),
    ("bahrain", "BH"), ("bangladesh", "BD"), ("barbados", "BB"), ("belarus", "BY"),
    ("belgium", "BE"), ("belize", "BZ"), ("benin", "BJ"), ("bhutan", "BT"),
    ("bolivia", "BO"), ("bosnia and herzegovina", "BA"), ("botswana", "BW"), ("brazil", "BR"),
    ("brunei", "BN"), ("brunei darussalam", "BN"), ("bulgaria", "BG"), ("burkina faso", "BF"),
    ("burundi", "BI"), ("cabo verde", "CV"), ("cape verde", "CV"), ("cambodia", "KH"),
    ("cameroon", "CM"), ("canada", "CA"), ("central african republic", "CF"), ("chad", "TD"),
    ("chile", "CL"), ("china", "CN"), ("people's republic of china", "CN"), ("colombia", "CO"),
    ("comoros", "KM"), ("congo", "CG"), ("democratic republic of the congo", "CD"),
    ("congo, democratic republic of the", "CD"), ("costa rica", "CR"), ("croatia", "HR"),
    ("cuba", "CU"), ("cyprus", "CY"), ("czech republic", "CZ"), ("czechia", "CZ"),
    ("denmark", "DK"), ("djibouti", "DJ"), ("dominica", "DM"), ("dominican republic", "DO"),
    ("ecuador", "EC"), ("egypt", "EG"), ("el salvador", "SV"), ("equatorial guinea", "GQ"),
    ("eritrea", "ER"), ("estonia", "EE"), ("eswatini", "SZ"), ("swaziland", "SZ"),
    ("ethiopia", "ET"), ("fiji", "FJ"), ("finland", "FI"), ("france", "FR"),
    ("gabon", "GA"), ("gambia", "GM"), ("georgia", "GE"), ("germany", "DE"),
    ("ghana", "GH"), ("greece", "GR"), ("grenada", "GD"), ("guatemala", "GT"),
    ("guinea", "GN"), ("guinea-bissau", "GW"), ("guyana", "GY"), ("haiti", "HT"),
    ("honduras", "HN"), ("hong kong", "HK"), ("hungary", "HU"), ("iceland", "IS"),
    ("india", "IN"), ("indonesia", "ID"), ("iran", "IR"), ("iran (islamic republic of)", "IR"),
    ("iraq", "IQ"), ("ireland", "IE"), ("israel", "IL"), ("italy", "IT"),
    ("ivory coast", "CI"), ("cote d'ivoire", "CI"), ("côte d'ivoire", "CI"), ("jamaica", "JM"),
    ("japan", "JP"), ("jordan", "JO"), ("kazakhstan", "KZ"), ("kenya", "KE"),
    ("kiribati", "KI"), ("north korea", "KP"), ("korea, north", "KP"),
    ("democratic people's republic of korea", "KP"), ("south korea", "KR"), ("korea, south", "KR"),
    ("republic of korea", "KR"), ("kosovo", "XK"), ("kuwait", "KW"), ("kyrgyzstan", "KG"),
    ("laos", "LA"), ("lao people's democratic republic", "LA"), ("latvia", "LV"),
    ("lebanon", "LB"), ("lesotho", "LS"), ("liberia", "LR"), ("libya", "LY"),
    ("liechtenstein", "LI"), ("lithuania", "LT"), ("luxembourg", "LU"), ("macau", "MO"),
    ("macao", "MO"), ("madagascar", "MG"), ("malawi", "MW"), ("malaysia", "MY"),
    ("maldives", "MV"), ("mali", "ML"), ("malta", "MT"), ("marshall islands", "MH"),
    ("mauritania", "MR"), ("mauritius", "MU"), ("mexico", "MX"), ("micronesia", "FM"),
    ("moldova", "MD"), ("monaco", "MC"), ("mongolia", "MN"), ("montenegro", "ME"),
    ("morocco", "MA"), ("mozambique", "MZ"), ("myanmar", "MM"), ("burma", "MM"),
    ("namibia", "NA"), ("nauru", "NR"), ("nepal", "NP"), ("netherlands", "NL"),
    ("new zealand", "NZ"), ("nicaragua", "NI"), ("niger", "NE"), ("nigeria", "NG"),
    ("north macedonia", "MK"), ("macedonia", "MK"), ("norway", "NO"), ("oman", "OM"),
    ("pakistan", "PK"), ("palau", "PW"), ("palestine", "PS"), ("panama", "PA"),
    ("papua new guinea", "PG"), ("paraguay", "PY"), ("peru", "PE"), ("philippines", "PH"),
    ("poland", "PL"), ("portugal", "PT"), ("qatar", "QA"), ("romania", "RO"),
    ("russia", "RU"), ("russian federation", "RU"), ("rwanda", "RW"),
    ("saint kitts and nevis", "KN"), ("saint lucia", "LC"), ("saint vincent and the grenadines", "VC"),
    ("samoa", "WS"), ("san marino", "SM"), ("sao tome and principe", "ST"),
    ("saudi arabia", "SA"), ("senegal", "SN"), ("serbia", "RS"), ("seychelles", "SC"),
    ("sierra leone", "SL"), ("singapore", "SG"), ("slovakia", "SK"), ("slovenia", "SI"),
    ("solomon islands", "SB"), ("somalia", "SO"), ("south africa", "ZA"), ("south sudan", "SS"),
    ("spain", "ES"), ("sri lanka", "LK"), ("sudan", "SD"), ("suriname", "SR"),
    ("sweden", "SE"), ("switzerland", "CH"), ("syria", "SY"), ("syrian arab republic", "SY"),
    ("taiwan", "TW"), ("tajikistan", "TJ"), ("tanzania", "TZ"), ("thailand", "TH"),
    ("timor-leste", "TL"), ("togo", "TG"), ("tonga", "TO"), ("trinidad and tobago", "TT"),
    ("tunisia", "TN"), ("turkey", "TR"), ("turkiye", "TR"), ("türkiye", "TR"),
    ("turkmenistan", "TM"), ("tuvalu", "TV"), ("uganda", "UG"), ("ukraine", "UA"),
    ("united arab emirates", "AE"), ("uae", "AE"), ("united kingdom", "GB"),
    ("great britain", "GB"), ("uk", "GB"), ("united states", "US"), ("united states of america", "US"),
    ("usa", "US"), ("uruguay", "UY"), ("uzbekistan", "UZ"), ("vanuatu", "VU"),
    ("vatican city", "VA"), ("holy see", "VA"), ("venezuela", "VE"), ("vietnam", "VN"),
    ("viet nam", "VN"), ("yemen", "YE"), ("zambia", "ZM"), ("zimbabwe", "ZW"),
];

/// Resolve free-text country name to ISO-3166 alpha-2. Already-2-letter
/// alpha input is upper-cased and returned as-is (per spec §4.2); this
/// function does not validate that the code is a real ISO member, only
/// that it has the right shape.
pub fn country_to_iso2(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(trimmed.to_ascii_uppercase());
    }
    let key = trimmed.to_lowercase();
    COUNTRIES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, iso)| iso.to_string())
}
