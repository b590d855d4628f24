use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";
pub const ACTIVITY_DELIMITER: &str = ", ";

pub const ACTIVITY_OPTIONS: [&str; 8] = [
    "Pesquisa Red",
    "Red Simulado",
    "Inventário GDM",
    "Troca GDM",
    "Manutenção",
    "Troca de EPI's",
    "Solicitação de Crachá",
    "Outros",
];

pub fn timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Keeps known activities in the order they were posted, once each.
pub fn known_activities(selected: Vec<String>) -> Vec<String> {
    selected.into_iter().fold(Vec::new(), |mut kept, activity| {
        if ACTIVITY_OPTIONS.contains(&activity.as_str()) && !kept.contains(&activity) {
            kept.push(activity);
        }
        kept
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    pub timestamp: String,
    pub promoter_name: String,
    pub registration_id: String,
    pub store_code: String,
    pub city: String,
    pub activities: Vec<String>,
    pub notes: String,
    pub image_links: String,
}

impl VisitRecord {
    pub const COLUMNS: [&'static str; 8] = [
        "Data/Hora",
        "Nome",
        "Matrícula",
        "Código Loja",
        "Cidade",
        "Atividades",
        "Observações",
        "Fotos",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.promoter_name.clone(),
            self.registration_id.clone(),
            self.store_code.clone(),
            self.city.clone(),
            self.activities.join(ACTIVITY_DELIMITER),
            self.notes.clone(),
            self.image_links.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdmRecord {
    pub timestamp: String,
    pub promoter_name: String,
    pub store_code: String,
    pub not_surveyed: String,
    pub missing: String,
    pub broken: String,
    pub note: String,
    pub image_links: String,
}

impl GdmRecord {
    pub const COLUMNS: [&'static str; 8] = [
        "Data/Hora",
        "Nome Promotor",
        "Código Loja",
        "GDMs Não Pesquisadas",
        "GDMs Perdidas",
        "GDMs Paradas/Quebradas",
        "Observação Geral",
        "Fotos",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.promoter_name.clone(),
            self.store_code.clone(),
            self.not_surveyed.clone(),
            self.missing.clone(),
            self.broken.clone(),
            self.note.clone(),
            self.image_links.clone(),
        ]
    }
}
