use crate::forms::records::ACTIVITY_OPTIONS;
use crate::forms::{GdmForm, VisitForm};
use crate::report::ReportKind;
use axum::response::Html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
    Info(String),
}

impl Notice {
    fn class(&self) -> &'static str {
        match self {
            Notice::Success(_) => "success",
            Notice::Warning(_) => "warning",
            Notice::Error(_) => "error",
            Notice::Info(_) => "info",
        }
    }

    fn text(&self) -> &str {
        match self {
            Notice::Success(text) | Notice::Warning(text) | Notice::Error(text) | Notice::Info(text) => {
                text
            }
        }
    }

    fn render(&self) -> String {
        format!(
            r#"<div class="notice {}">{}</div>"#,
            self.class(),
            escape(self.text())
        )
    }
}

pub fn escape(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, ch| {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
        out
    })
}

fn layout(brand: &str, title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{brand} - {title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/visita">Área do Promotor (Visitas)</a><a href="/gdm">Controle de GDM ❄️</a><a href="/admin">Painel Administrativo</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        brand = escape(brand),
        title = escape(title),
    ))
}

fn notices(notice: Option<&Notice>) -> String {
    notice.map(Notice::render).unwrap_or_default()
}

fn text_input(label: &str, name: &str, value: &str, placeholder: &str) -> String {
    format!(
        r#"<label>{label}<input type="text" name="{name}" value="{value}" placeholder="{placeholder}"></label>"#,
        label = escape(label),
        value = escape(value),
        placeholder = escape(placeholder),
    )
}

fn text_area(label: &str, name: &str, value: &str) -> String {
    format!(
        r#"<label>{label}<textarea name="{name}" rows="3">{value}</textarea></label>"#,
        label = escape(label),
        value = escape(value),
    )
}

fn photo_input(label: &str) -> String {
    format!(
        r#"<label>{}<input type="file" name="fotos" accept=".png,.jpg,.jpeg" multiple></label>"#,
        escape(label)
    )
}

pub fn visit_page(brand: &str, form: &VisitForm, notice: Option<&Notice>) -> Html<String> {
    let options = ACTIVITY_OPTIONS
        .iter()
        .map(|option| {
            let selected = if form.activities.iter().any(|picked| picked == option) {
                " selected"
            } else {
                ""
            };
            format!(
                r#"<option value="{value}"{selected}>{value}</option>"#,
                value = escape(option)
            )
        })
        .collect::<String>();

    let body = format!(
        r#"{info}{notice}
<form method="post" action="/visita" enctype="multipart/form-data">
<div class="columns">{nome}{matricula}</div>
<div class="columns">{loja}{cidade}</div>
<label>Atividades<select name="atividades" multiple size="8">{options}</select></label>
{obs}
{fotos}
<button type="submit">REGISTRAR VISITA 💾</button>
</form>"#,
        info = Notice::Info("Preencha os dados da visita diária.".to_string()).render(),
        notice = notices(notice),
        nome = text_input("Nome", "nome", &form.name, "Ex: João Silva"),
        matricula = text_input("Matrícula", "matricula", &form.registration_id, "Ex: 123456"),
        loja = text_input("Código Loja", "cod_loja", &form.store_code, "Ex: 9988"),
        cidade = text_input("Cidade", "cidade", &form.city, "Ex: Belém"),
        obs = text_area("Observações", "obs", &form.notes),
        fotos = photo_input("Evidências (Opcional)"),
    );

    layout(brand, "Relatório de Campo", &body)
}

pub fn gdm_page(brand: &str, form: &GdmForm, notice: Option<&Notice>) -> Html<String> {
    let body = format!(
        r#"{warning}{notice}
<form method="post" action="/gdm" enctype="multipart/form-data">
<div class="columns">{nome}{loja}</div>
<h3>🧊 Status das GDMs</h3>
<p>Insira os códigos patrimoniais separados por vírgula ou espaço.</p>
{nao_pesq}
{perdidas}
{paradas}
{obs}
{fotos}
<button type="submit">REGISTRAR GDM ❄️</button>
</form>"#,
        warning = Notice::Warning(
            "Use esta área apenas para reportar divergências em Geladeiras.".to_string()
        )
        .render(),
        notice = notices(notice),
        nome = text_input("Nome Promotor", "nome", &form.promoter_name, ""),
        loja = text_input("Código Loja", "cod_loja", &form.store_code, ""),
        nao_pesq = text_area("GDMs Não Pesquisadas", "gdm_nao_pesq", &form.not_surveyed),
        perdidas = text_area("GDMs Perdidas", "gdm_perdidas", &form.missing),
        paradas = text_area("GDMs Paradas/Quebradas", "gdm_paradas", &form.broken),
        obs = text_input("Observação Geral", "obs_gdm", &form.note, ""),
        fotos = photo_input("Foto da Etiqueta/GDM"),
    );

    layout(brand, "Controle de GDM", &body)
}

pub fn admin_login(brand: &str, notice: Option<&Notice>) -> Html<String> {
    let body = format!(
        r#"{notice}
<form method="post" action="/admin">
<label>🔑 Senha de administrador:<input type="password" name="senha"></label>
<button type="submit">Entrar</button>
</form>"#,
        notice = notices(notice),
    );

    layout(brand, "Painel Gerencial", &body)
}

/// Admin panel; each report button posts the password again.
pub fn admin_panel(
    brand: &str,
    password: &str,
    tab_for: impl Fn(ReportKind) -> String,
    result: Option<(ReportKind, &Notice)>,
) -> Html<String> {
    let columns = ReportKind::ALL
        .iter()
        .map(|kind| {
            let outcome = result
                .filter(|(reported, _)| reported == kind)
                .map(|(_, notice)| notice.render())
                .unwrap_or_default();
            format!(
                r#"<div>
{heading}
<p>Puxa dados da aba {tab}.</p>
<form method="post" action="/admin/relatorio/{slug}">
<input type="hidden" name="senha" value="{password}">
<button type="submit">Enviar {label} 📧</button>
</form>
{outcome}
</div>"#,
                heading = Notice::Info(kind.title().to_string()).render(),
                tab = escape(&tab_for(*kind)),
                slug = kind.slug(),
                password = escape(password),
                label = escape(kind.title()),
            )
        })
        .collect::<String>();

    let body = format!(
        r#"{unlocked}
<div class="columns">{columns}</div>"#,
        unlocked = Notice::Success("Painel Liberado".to_string()).render(),
    );

    layout(brand, "Painel Gerencial", &body)
}
