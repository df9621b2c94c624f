//! Universe of Korean financial-sector companies the agents know about

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Financial industry sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Banking,
    Securities,
    Insurance,
}

impl Sector {
    pub const ALL: [Self; 3] = [Self::Banking, Self::Securities, Self::Insurance];

    /// Identifier used as the sector entity value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banking => "banking",
            Self::Securities => "securities",
            Self::Insurance => "insurance",
        }
    }

    /// Korean sector name, used in search queries
    pub fn korean_name(&self) -> &'static str {
        match self {
            Self::Banking => "은행",
            Self::Securities => "증권",
            Self::Insurance => "보험",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "banking" | "bank" | "banks" | "은행" => Ok(Self::Banking),
            "securities" | "brokerage" | "증권" => Ok(Self::Securities),
            "insurance" | "insurer" | "보험" => Ok(Self::Insurance),
            other => Err(format!("unknown sector '{other}'")),
        }
    }
}

/// A listed company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Six digit KRX listing code
    pub code: String,
    pub name: String,
    pub sector: Sector,
    /// Alternative spellings matched in queries
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Company {
    pub fn new(code: &str, name: &str, sector: Sector, aliases: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sector,
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Symbol on Yahoo Finance (KOSPI listing)
    pub fn yahoo_symbol(&self) -> String {
        format!("{}.KS", self.code)
    }

    /// Whether `text` mentions this company by name or alias
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .any(|name| lower.contains(&name.to_lowercase()))
    }
}

/// Companies grouped by sector, in ranking order within each sector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyUniverse {
    companies: Vec<Company>,
}

impl Default for CompanyUniverse {
    fn default() -> Self {
        Self::korean_financials()
    }
}

impl CompanyUniverse {
    pub fn new(companies: Vec<Company>) -> Self {
        Self { companies }
    }

    /// Major listed banks, securities firms and insurers in Korea
    pub fn korean_financials() -> Self {
        use Sector::{Banking, Insurance, Securities};

        Self::new(vec![
            Company::new("105560", "KB금융지주", Banking, &["KB금융", "KB Financial"]),
            Company::new("055550", "신한지주", Banking, &["신한금융", "Shinhan"]),
            Company::new("086790", "하나금융지주", Banking, &["하나금융", "Hana Financial"]),
            Company::new("316140", "우리금융지주", Banking, &["우리금융", "Woori Financial"]),
            Company::new("138930", "BNK금융지주", Banking, &["BNK Financial"]),
            Company::new("139130", "DGB금융지주", Banking, &["DGB Financial"]),
            Company::new("175330", "JB금융지주", Banking, &["JB Financial"]),
            Company::new("024110", "기업은행", Banking, &["Industrial Bank of Korea", "IBK"]),
            Company::new("071050", "한국금융지주", Banking, &["Korea Investment Holdings"]),
            Company::new("138040", "메리츠금융지주", Banking, &["Meritz Financial"]),
            Company::new("006800", "미래에셋증권", Securities, &["미래에셋", "Mirae Asset"]),
            Company::new("005940", "NH투자증권", Securities, &["NH Investment"]),
            Company::new("016360", "삼성증권", Securities, &["Samsung Securities"]),
            Company::new("039490", "키움증권", Securities, &["Kiwoom"]),
            Company::new("078020", "한국투자증권", Securities, &["Korea Investment Securities"]),
            Company::new("008560", "메리츠증권", Securities, &["Meritz Securities"]),
            Company::new("003540", "대신증권", Securities, &["Daishin"]),
            Company::new("001720", "신영증권", Securities, &["Shinyoung"]),
            Company::new("003470", "유안타증권", Securities, &["Yuanta"]),
            Company::new("030610", "교보증권", Securities, &["Kyobo Securities"]),
            Company::new("032830", "삼성생명", Insurance, &["Samsung Life"]),
            Company::new("000810", "삼성화재", Insurance, &["Samsung Fire"]),
            Company::new("005830", "DB손해보험", Insurance, &["DB손보", "DB Insurance"]),
            Company::new("001450", "현대해상", Insurance, &["Hyundai Marine"]),
            Company::new("000060", "메리츠화재", Insurance, &["Meritz Fire"]),
            Company::new("088350", "한화생명", Insurance, &["Hanwha Life"]),
            Company::new("000400", "롯데손해보험", Insurance, &["Lotte Insurance"]),
            Company::new("093050", "LIG손해보험", Insurance, &["LIG Insurance"]),
            Company::new("057050", "코리안리", Insurance, &["Korean Re"]),
            Company::new("237350", "교보라이프플래닛", Insurance, &["Kyobo Lifeplanet"]),
        ])
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    /// Companies of one sector in ranking order
    pub fn in_sector(&self, sector: Sector) -> impl Iterator<Item = &Company> {
        self.companies.iter().filter(move |c| c.sector == sector)
    }

    pub fn by_code(&self, code: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.code == code)
    }

    /// Look up a company by exact name, alias or code
    pub fn find(&self, name_or_code: &str) -> Option<&Company> {
        let needle = name_or_code.trim().to_lowercase();
        self.companies.iter().find(|c| {
            c.code == needle
                || c.name.to_lowercase() == needle
                || c.aliases.iter().any(|a| a.to_lowercase() == needle)
        })
    }

    /// Companies mentioned in free text, in universe order
    pub fn mentioned_in(&self, text: &str) -> Vec<&Company> {
        self.companies
            .iter()
            .filter(|c| c.is_mentioned_in(text))
            .collect()
    }

    /// Leading company of each sector, analysed when no company is named
    pub fn default_targets(&self) -> Vec<&Company> {
        Sector::ALL
            .iter()
            .filter_map(|sector| self.in_sector(*sector).next())
            .collect()
    }

    /// Companies compared in a sector analysis
    pub fn comparison_set(&self, sector: Sector) -> Vec<&Company> {
        self.in_sector(sector).take(5).collect()
    }
}
