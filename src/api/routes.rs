use crate::api::get_embedded_asset;
use crate::api::views::{self, Notice};
use crate::forms::{AdminAccess, FormController, GdmForm, SubmissionOutcome, VisitForm};
use crate::report::{ReportKind, ReportStatus};
use crate::uploader::{ImageFile, is_supported_image};
use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;

const VISIT_SAVED: &str = "✅ Visita registrada com sucesso!";
const GDM_SAVED: &str = "✅ Ocorrência de GDM registrada!";
const WRONG_PASSWORD: &str = "Senha Incorreta.";

#[derive(Clone)]
pub struct AppState {
    pub controller: FormController,
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.controller.config().max_upload_bytes;

    Router::new()
        .route("/", get(|| async { Redirect::to("/visita") }))
        .route("/visita", get(visit_form).post(visit_submit))
        .route("/gdm", get(gdm_form).post(gdm_submit))
        .route("/admin", get(admin_page).post(admin_login))
        .route("/admin/relatorio/:kind", post(admin_report))
        .route("/api/v1/status", get(status))
        .route("/static/*path", get(static_asset))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AdminForm {
    #[serde(default)]
    senha: String,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    service: &'static str,
    version: &'static str,
    spreadsheet: String,
    visits_tab: String,
    gdm_tab: String,
    append_mode: String,
}

/// Text fields and image files from one multipart form post.
#[derive(Debug, Default)]
struct FormFields {
    text: Vec<(String, String)>,
    files: Vec<ImageFile>,
}

impl FormFields {
    fn text(&self, name: &str) -> String {
        self.text
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.text
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn unsupported_file(&self) -> Option<&str> {
        self.files
            .iter()
            .map(|file| file.file_name.as_str())
            .find(|name| !is_supported_image(name))
    }
}

async fn read_form_fields(mut multipart: Multipart) -> ApiResult<FormFields> {
    let mut fields = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(format!("Invalid form data: {error}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToOwned::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::BadRequest(format!("Invalid form data: {error}")))?;

        match file_name {
            Some(file_name) => {
                // Browsers send an empty part when no file was picked.
                if !file_name.is_empty() && !bytes.is_empty() {
                    fields.files.push(ImageFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            None => fields
                .text
                .push((name, String::from_utf8_lossy(&bytes).into_owned())),
        }
    }

    Ok(fields)
}

async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("Form worker failed")
        .map_err(ApiError::from)
}

async fn visit_form(State(state): State<AppState>) -> Html<String> {
    views::visit_page(
        &state.controller.config().brand_name,
        &VisitForm::default(),
        None,
    )
}

async fn visit_submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Html<String>> {
    let fields = read_form_fields(multipart).await?;
    let brand = state.controller.config().brand_name.clone();
    let form = VisitForm {
        name: fields.text("nome"),
        registration_id: fields.text("matricula"),
        store_code: fields.text("cod_loja"),
        city: fields.text("cidade"),
        activities: fields.all("atividades"),
        notes: fields.text("obs"),
    };

    if let Some(file_name) = fields.unsupported_file() {
        let notice = Notice::Error(format!("⚠️ Formato de imagem não suportado: {file_name}"));
        return Ok(views::visit_page(&brand, &form, Some(&notice)));
    }

    let controller = state.controller.clone();
    let submitted = form.clone();
    let outcome = run_blocking(move || {
        controller.submit_visit(submitted, &fields.files, Local::now())
    })
    .await?;

    Ok(match outcome {
        SubmissionOutcome::Saved { .. } => views::visit_page(
            &brand,
            &VisitForm::default(),
            Some(&Notice::Success(VISIT_SAVED.to_string())),
        ),
        SubmissionOutcome::Rejected(message) | SubmissionOutcome::Failed(message) => {
            views::visit_page(&brand, &form, Some(&Notice::Error(message)))
        }
    })
}

async fn gdm_form(State(state): State<AppState>) -> Html<String> {
    views::gdm_page(
        &state.controller.config().brand_name,
        &GdmForm::default(),
        None,
    )
}

async fn gdm_submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Html<String>> {
    let fields = read_form_fields(multipart).await?;
    let brand = state.controller.config().brand_name.clone();
    let form = GdmForm {
        promoter_name: fields.text("nome"),
        store_code: fields.text("cod_loja"),
        not_surveyed: fields.text("gdm_nao_pesq"),
        missing: fields.text("gdm_perdidas"),
        broken: fields.text("gdm_paradas"),
        note: fields.text("obs_gdm"),
    };

    if let Some(file_name) = fields.unsupported_file() {
        let notice = Notice::Error(format!("⚠️ Formato de imagem não suportado: {file_name}"));
        return Ok(views::gdm_page(&brand, &form, Some(&notice)));
    }

    let controller = state.controller.clone();
    let submitted = form.clone();
    let outcome =
        run_blocking(move || controller.submit_gdm(submitted, &fields.files, Local::now())).await?;

    Ok(match outcome {
        SubmissionOutcome::Saved { .. } => views::gdm_page(
            &brand,
            &GdmForm::default(),
            Some(&Notice::Success(GDM_SAVED.to_string())),
        ),
        SubmissionOutcome::Rejected(message) | SubmissionOutcome::Failed(message) => {
            views::gdm_page(&brand, &form, Some(&Notice::Error(message)))
        }
    })
}

async fn admin_page(State(state): State<AppState>) -> Html<String> {
    views::admin_login(&state.controller.config().brand_name, None)
}

async fn admin_login(
    State(state): State<AppState>,
    Form(login): Form<AdminForm>,
) -> Html<String> {
    match state.controller.admin_access(&login.senha) {
        AdminAccess::Granted => render_panel(&state.controller, &login.senha, None),
        access => locked_page(&state.controller, access),
    }
}

async fn admin_report(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Form(login): Form<AdminForm>,
) -> ApiResult<Html<String>> {
    let kind = kind.parse::<ReportKind>().map_err(ApiError::NotFound)?;

    let controller = state.controller.clone();
    let password = login.senha.clone();
    let status = run_blocking(move || controller.run_report(&password, kind, Local::now())).await?;

    let Some(status) = status else {
        let access = state.controller.admin_access(&login.senha);
        return Ok(locked_page(&state.controller, access));
    };

    let notice = match status {
        ReportStatus::Sent { records } => Notice::Success(format!("Enviado! ({records} registros)")),
        ReportStatus::Empty => Notice::Warning("Sem dados.".to_string()),
        ReportStatus::Failed(text) => Notice::Error(text),
    };

    Ok(render_panel(
        &state.controller,
        &login.senha,
        Some((kind, &notice)),
    ))
}

fn render_panel(
    controller: &FormController,
    password: &str,
    result: Option<(ReportKind, &Notice)>,
) -> Html<String> {
    let config = controller.config();
    views::admin_panel(
        &config.brand_name,
        password,
        |kind| kind.tab(config).to_string(),
        result,
    )
}

fn locked_page(controller: &FormController, access: AdminAccess) -> Html<String> {
    let notice = (access == AdminAccess::Denied).then(|| Notice::Error(WRONG_PASSWORD.to_string()));
    views::admin_login(&controller.config().brand_name, notice.as_ref())
}

async fn status(State(state): State<AppState>) -> Json<StatusPayload> {
    let config = state.controller.config();

    Json(StatusPayload {
        service: "FieldReport",
        version: env!("CARGO_PKG_VERSION"),
        spreadsheet: config.spreadsheet_name.clone(),
        visits_tab: config.visits_tab.clone(),
        gdm_tab: config.gdm_tab.clone(),
        append_mode: config.append_mode.to_string(),
    })
}

async fn static_asset(Path(path): Path<String>) -> ApiResult<Response> {
    match get_embedded_asset(&path) {
        Some((bytes, mime)) => {
            let mut response = Response::new(bytes.into_response().into_body());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime)?);
            Ok(response)
        }
        None => Err(ApiError::NotFound("Static asset not found".to_string())),
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, router};
    use crate::forms::FormController;
    use crate::testing::{FakeImageHost, MemorySheets, RecordingMailer, row, test_config};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-FIELDREPORT-BOUNDARY";

    fn app() -> (Router, Arc<MemorySheets>, Arc<RecordingMailer>) {
        let config = Arc::new(test_config());
        let sheets = Arc::new(MemorySheets::with_tabs(&[
            config.visits_tab.as_str(),
            config.gdm_tab.as_str(),
        ]));
        let mailer = Arc::new(RecordingMailer::default());
        let controller = FormController::new(
            config,
            sheets.clone(),
            Arc::new(FakeImageHost::default()),
            mailer.clone(),
        );

        (router(AppState { controller }), sheets, mailer)
    }

    fn multipart_body(text: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in text {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fotos\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn urlencoded_request(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serves_visit_form() {
        let (app, _, _) = app();

        let response = app
            .oneshot(Request::get("/visita").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("REGISTRAR VISITA"));
        assert!(html.contains("Manutenção"));
    }

    #[tokio::test]
    async fn visit_post_appends_row() {
        let (app, sheets, _) = app();
        let body = multipart_body(
            &[
                ("nome", "Ana"),
                ("matricula", ""),
                ("cod_loja", "1234"),
                ("cidade", ""),
                ("atividades", "Manutenção"),
                ("obs", ""),
            ],
            &[("foto.jpg", &b"\xFF\xD8\xFF"[..])],
        );

        let response = app
            .oneshot(multipart_request("/visita", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Visita registrada com sucesso"));

        let rows = sheets.rows("Atividades_Semanais_Promotor");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1..6], row(&["Ana", "", "1234", "", "Manutenção"])[..]);
        assert_eq!(rows[0][7], "https://img.test/foto.jpg");
    }

    #[tokio::test]
    async fn activities_are_stored_in_posted_order() {
        let (app, sheets, _) = app();
        let body = multipart_body(
            &[
                ("nome", "Ana"),
                ("cod_loja", "1234"),
                ("atividades", "Pesquisa Red"),
                ("atividades", "Troca GDM"),
                ("atividades", "Outros"),
            ],
            &[],
        );

        app.oneshot(multipart_request("/visita", body))
            .await
            .unwrap();

        let rows = sheets.rows("Atividades_Semanais_Promotor");
        assert_eq!(rows[0][5], "Pesquisa Red, Troca GDM, Outros");
        assert_eq!(rows[0][7], "-");
    }

    #[tokio::test]
    async fn gdm_post_without_status_fields_is_rejected() {
        let (app, sheets, _) = app();
        let body = multipart_body(&[("nome", "Bia"), ("cod_loja", "55")], &[]);

        let response = app.oneshot(multipart_request("/gdm", body)).await.unwrap();

        let html = body_text(response).await;
        assert!(html.contains("Preencha pelo menos um campo de GDM!"));
        assert!(html.contains(r#"value="Bia""#));
        assert!(sheets.rows("Controle_GDM").is_empty());
    }

    #[tokio::test]
    async fn unsupported_image_type_is_rejected() {
        let (app, sheets, _) = app();
        let body = multipart_body(
            &[("nome", "Ana"), ("cod_loja", "1"), ("atividades", "Outros")],
            &[("notas.pdf", &b"%PDF"[..])],
        );

        let response = app
            .oneshot(multipart_request("/visita", body))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("notas.pdf"));
        assert!(sheets.rows("Atividades_Semanais_Promotor").is_empty());
    }

    #[tokio::test]
    async fn wrong_admin_password_is_refused() {
        let (app, _, _) = app();

        let response = app
            .oneshot(urlencoded_request("/admin", "senha=errada"))
            .await
            .unwrap();

        let html = body_text(response).await;
        assert!(html.contains("Senha Incorreta."));
        assert!(!html.contains("Painel Liberado"));
    }

    #[tokio::test]
    async fn report_button_needs_the_password() {
        let (app, sheets, mailer) = app();
        sheets.seed(
            "Atividades_Semanais_Promotor",
            vec![row(&["Data/Hora", "Nome"]), row(&["x", "Ana"])],
        );

        let denied = app
            .clone()
            .oneshot(urlencoded_request("/admin/relatorio/visitas", "senha=nope"))
            .await
            .unwrap();
        assert!(body_text(denied).await.contains("Senha Incorreta."));
        assert!(mailer.sent().is_empty());

        let granted = app
            .oneshot(urlencoded_request("/admin/relatorio/visitas", "senha=segredo"))
            .await
            .unwrap();
        assert!(body_text(granted).await.contains("Enviado! (1 registros)"));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn unknown_report_kind_is_not_found() {
        let (app, _, _) = app();

        let response = app
            .oneshot(urlencoded_request("/admin/relatorio/estoque", "senha=segredo"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_embedded_stylesheet() {
        let (app, _, _) = app();

        let response = app
            .oneshot(Request::get("/static/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
    }
}
