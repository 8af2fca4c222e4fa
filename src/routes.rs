use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, get_service, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::error::{BlogError, BlogResult};
use crate::hot_reload::ws_handler;
use crate::models::{Category, Post};
use crate::posts::{combined_posts, filter_posts, find_with_neighbours, PostInput};
use crate::state::{AppState, RouterState};
use crate::storage::blocking;
use crate::views::{self, EditorView, GuestbookView};

const RECENT_POSTS: usize = 6;

pub fn router(router_state: RouterState) -> Router {
    let static_dir = get_service(ServeDir::new(
        router_state.app_state.config.content_dir.join("static"),
    ));

    Router::new()
        .route("/", get(homepage))
        .route("/about", get(about))
        .route("/blog", get(blog_list))
        .route("/blog/write", get(write_gate).post(submit_editor))
        .route("/blog/write/unlock", post(unlock_editor))
        .route("/blog/delete", post(delete_post))
        .route("/blog/{slug}", get(post_detail))
        .route("/guestbook", get(guestbook).post(sign_guestbook))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(router_state)
}

async fn page(state: &AppState, title: &str, path: &str, body: &str) -> Html<String> {
    let content = state.content.read().await;
    Html(views::render_with_layout(
        &content.layout_html,
        title,
        path,
        body,
        state.config.is_development,
    ))
}

async fn page_with_status(
    state: &AppState,
    status: StatusCode,
    title: &str,
    path: &str,
    body: &str,
) -> Response {
    (status, page(state, title, path, body).await).into_response()
}

/// Persisted posts merged with the bundled ones.
async fn merged_posts(state: &AppState) -> BlogResult<Vec<Post>> {
    let bundled = state.content.read().await.posts.clone();
    let repo = state.posts.clone();
    blocking(move || combined_posts(repo.as_ref(), &bundled)).await
}

async fn homepage(State(state): State<Arc<AppState>>) -> BlogResult<Html<String>> {
    let posts = merged_posts(&state).await?;
    let home_html = state.content.read().await.home_html.clone();
    let recent = &posts[..posts.len().min(RECENT_POSTS)];
    Ok(page(&state, "Dev Blog", "/", &views::home_page(&home_html, recent)).await)
}

async fn about(State(state): State<Arc<AppState>>) -> Html<String> {
    let body = views::about_page(&state.content.read().await.about);
    page(&state, "소개", "/about", &body).await
}

#[derive(Deserialize, Debug, Default)]
struct ListQuery {
    category: Option<String>,
    q: Option<String>,
}

async fn blog_list(
    Query(query): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> BlogResult<Html<String>> {
    let posts = merged_posts(&state).await?;

    // Unknown labels, including the "all" label, select every category.
    let category = query.category.as_deref().and_then(|c| c.parse::<Category>().ok());
    let search = query.q.unwrap_or_default();
    let visible = filter_posts(&posts, category, &search);

    Ok(page(&state, "블로그", "/blog", &views::blog_list_page(&visible, category, &search)).await)
}

async fn render_post(
    state: &AppState,
    slug: &str,
    status: StatusCode,
    error: Option<&str>,
) -> BlogResult<Response> {
    let posts = merged_posts(state).await?;

    let Some(neighbours) = find_with_neighbours(&posts, slug) else {
        let body = {
            let content = state.content.read().await;
            views::not_found_page(&content.not_found_html, slug)
        };
        let err = BlogError::NotFound(slug.to_string());
        info!("{}", err);
        return Ok(page_with_status(state, err.status(), "Not Found", "/blog", &body).await);
    };

    let post = neighbours.current;
    let repo = state.posts.clone();
    let id = post.id.clone();
    let deletable = blocking(move || repo.get(&id)).await?.is_some();
    let body_html = state.renderer.render(&post.content);
    let body = views::post_detail_page(&neighbours, &body_html, deletable, error);
    Ok(page_with_status(state, status, &post.title, &format!("/blog/{}", post.slug), &body).await)
}

async fn post_detail(
    Path(slug): Path<String>,
    State(state): State<Arc<AppState>>,
) -> BlogResult<Response> {
    render_post(&state, &slug, StatusCode::OK, None).await
}

async fn write_gate(State(state): State<Arc<AppState>>) -> Html<String> {
    page(&state, "글 작성 권한 확인", "/blog/write", &views::gate_page(None)).await
}

async fn rejected_gate(state: &AppState, err: &BlogError) -> Response {
    let message = err.to_string();
    let body = views::gate_page(Some(message.as_str()));
    page_with_status(state, err.status(), "글 작성 권한 확인", "/blog/write", &body).await
}

async fn editor(state: &AppState, status: StatusCode, view: EditorView<'_>) -> Response {
    page_with_status(state, status, "글 작성하기", "/blog/write", &views::editor_page(&view)).await
}

#[derive(Deserialize, Debug)]
struct UnlockForm {
    #[serde(default)]
    password: String,
}

async fn unlock_editor(
    State(state): State<Arc<AppState>>,
    Form(form): Form<UnlockForm>,
) -> BlogResult<Response> {
    if let Err(err) = state.gate.check(&form.password) {
        return Ok(rejected_gate(&state, &err).await);
    }

    let drafts = state.drafts.clone();
    let draft = blocking(move || drafts.load()).await?;
    let notice = draft.as_ref().map(|_| "임시저장된 글을 불러왔습니다.");
    let input = draft.map(PostInput::from).unwrap_or_default();
    let view = EditorView {
        input: &input,
        password: &form.password,
        error: None,
        notice,
        preview_html: None,
    };
    Ok(editor(&state, StatusCode::OK, view).await)
}

#[derive(Deserialize, Debug, Default)]
struct EditorForm {
    #[serde(default)]
    password: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    action: String,
}

/// Browsers submit textarea values with CRLF line endings.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

impl EditorForm {
    fn input(&self) -> PostInput {
        let thumbnail = self.thumbnail.trim();
        PostInput {
            title: self.title.clone(),
            category: self.category.parse().ok(),
            content: normalize_line_endings(&self.content),
            thumbnail: (!thumbnail.is_empty()).then(|| thumbnail.to_string()),
        }
    }
}

async fn submit_editor(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EditorForm>,
) -> BlogResult<Response> {
    if let Err(err) = state.gate.check(&form.password) {
        return Ok(rejected_gate(&state, &err).await);
    }

    let input = form.input();
    let mut view = EditorView {
        input: &input,
        password: &form.password,
        error: None,
        notice: None,
        preview_html: None,
    };

    match form.action.as_str() {
        "preview" => {
            let preview = state.renderer.render(&input.content);
            view.preview_html = Some(preview.as_str());
            Ok(editor(&state, StatusCode::OK, view).await)
        }
        "edit" => Ok(editor(&state, StatusCode::OK, view).await),
        "draft" => {
            let result = match input.to_draft(Utc::now()) {
                Ok(draft) => {
                    let drafts = state.drafts.clone();
                    blocking(move || drafts.save(&draft)).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    view.notice = Some("게시글이 임시저장되었습니다!");
                    Ok(editor(&state, StatusCode::OK, view).await)
                }
                Err(BlogError::Validation(message)) => {
                    view.error = Some(message.as_str());
                    Ok(editor(&state, StatusCode::UNPROCESSABLE_ENTITY, view).await)
                }
                Err(e) => Err(e),
            }
        }
        "publish" => {
            let now = Utc::now();
            match input.publish(now.timestamp_millis().to_string(), now.date_naive()) {
                Ok(post) => {
                    let repo = state.posts.clone();
                    blocking(move || repo.save(post)).await?;
                    Ok(Redirect::to("/blog").into_response())
                }
                Err(BlogError::Validation(message)) => {
                    view.error = Some(message.as_str());
                    Ok(editor(&state, StatusCode::UNPROCESSABLE_ENTITY, view).await)
                }
                Err(e) => Err(e),
            }
        }
        other => {
            info!(action = other, "Rejected unknown editor action");
            view.error = Some("알 수 없는 요청입니다.");
            Ok(editor(&state, StatusCode::BAD_REQUEST, view).await)
        }
    }
}

#[derive(Deserialize, Debug)]
struct DeleteForm {
    id: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    password: String,
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DeleteForm>,
) -> BlogResult<Response> {
    if let Err(err) = state.gate.check(&form.password) {
        let posts = merged_posts(&state).await?;
        let Some(slug) = posts
            .iter()
            .find(|p| p.id == form.id || p.slug == form.slug)
            .map(|p| p.slug.clone())
        else {
            return Ok(err.into_response());
        };
        let message = err.to_string();
        return render_post(&state, &slug, err.status(), Some(message.as_str())).await;
    }

    let repo = state.posts.clone();
    blocking(move || repo.delete(&form.id)).await?;
    Ok(Redirect::to("/blog").into_response())
}

async fn guestbook(State(state): State<Arc<AppState>>) -> Html<String> {
    let entries = state.guestbook.entries().await;
    let view = GuestbookView {
        entries: &entries,
        nickname: "",
        message: "",
        error: None,
        notice: None,
    };
    page(&state, "방명록", "/guestbook", &views::guestbook_page(&view)).await
}

#[derive(Deserialize, Debug, Default)]
struct GuestbookForm {
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    message: String,
}

async fn sign_guestbook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<GuestbookForm>,
) -> BlogResult<Response> {
    let (status, error, keep_input) = match state.guestbook.sign(&form.nickname, &form.message, Utc::now()).await {
        Ok(_) => (StatusCode::OK, None, false),
        Err(BlogError::Validation(message)) => (StatusCode::UNPROCESSABLE_ENTITY, Some(message), true),
        Err(e) => return Err(e),
    };

    let entries = state.guestbook.entries().await;
    let view = GuestbookView {
        entries: &entries,
        nickname: if keep_input { form.nickname.as_str() } else { "" },
        message: if keep_input { form.message.as_str() } else { "" },
        error: error.as_deref(),
        notice: (!keep_input).then_some("방명록이 등록되었습니다!"),
    };
    Ok(page_with_status(&state, status, "방명록", "/guestbook", &views::guestbook_page(&view)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path as FsPath;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::content_loader::load_content;
    use crate::storage::{KeyValueStore, MemoryStore, POSTS_KEY};

    // "독서"
    const READING: &str = "%EB%8F%85%EC%84%9C";

    async fn test_state() -> (Arc<AppState>, Arc<dyn KeyValueStore>) {
        let config = Config {
            content_dir: FsPath::new(env!("CARGO_MANIFEST_DIR")).join("content"),
            ..Config::default()
        };
        let content = load_content(&config.content_dir).await.unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (Arc::new(AppState::new(config, content, store.clone())), store)
    }

    fn app(state: Arc<AppState>) -> Router {
        let (broadcaster, _rx) = broadcast::channel(1);
        router(RouterState {
            app_state: state,
            broadcaster,
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form_req(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn home_lists_six_recent_posts() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.matches("<article class=\"card\">").count(), 6);
        assert!(body.contains("최근 게시글"));
    }

    #[tokio::test]
    async fn blog_list_filters_by_category_and_query() {
        let (state, _) = test_state().await;

        let (_, body) = send(app(state.clone()), get_req(&format!("/blog?category={}", READING))).await;
        assert!(body.contains("clean-code-review"));
        assert!(!body.contains("solving-cors-errors"));

        let (_, body) = send(app(state.clone()), get_req("/blog?q=cors")).await;
        assert!(body.contains("solving-cors-errors"));
        assert!(!body.contains("clean-code-review"));

        let (_, body) = send(app(state), get_req("/blog?q=zzzz-no-match")).await;
        assert!(body.contains("검색 결과가 없습니다."));
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/blog/does-not-exist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("does-not-exist"));
    }

    #[tokio::test]
    async fn detail_renders_markdown_and_neighbours() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/blog/first-project-retrospective")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1 class=\"text-3xl font-bold mt-8 mb-6\">첫 프로젝트 회고록</h1>"));
        assert!(body.contains("이전 글"));
        assert!(body.contains("다음 글"));
        assert!(!body.contains("/blog/delete"));
    }

    #[tokio::test]
    async fn write_page_shows_gate() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/blog/write")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/blog/write/unlock"));
    }

    #[tokio::test]
    async fn wrong_password_keeps_editor_locked() {
        let (state, store) = test_state().await;
        let (status, body) = send(app(state.clone()), form_req("/blog/write/unlock", "password=1234")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("비밀번호가 올바르지 않습니다."));

        let publish = format!("password=12&title=Hi&category={}&content=Body&action=publish", READING);
        let (status, _) = send(app(state), form_req("/blog/write", &publish)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(store.get(POSTS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn publish_then_view_then_delete() {
        let (state, _) = test_state().await;

        let publish = format!(
            "password=123&title=Hello+Rust&category={}&content=%23+Heading%0A%0Abody&action=publish",
            READING
        );
        let response = app(state.clone()).oneshot(form_req("/blog/write", &publish)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/blog");

        let stored = state.posts.list().unwrap();
        assert_eq!(stored.len(), 1);
        let post = stored[0].clone();
        assert_eq!(post.slug, "hello-rust");
        assert_eq!(post.category, Category::Reading);

        let (status, body) = send(app(state.clone()), get_req("/blog/hello-rust")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(">Heading</h1>"));
        assert!(body.contains("/blog/delete"));

        let (_, body) = send(app(state.clone()), get_req("/")).await;
        assert!(body.contains("hello-rust"));

        let delete = format!("id={}&slug=hello-rust&password=123", post.id);
        let response = app(state.clone()).oneshot(form_req("/blog/delete", &delete)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.posts.list().unwrap().is_empty());

        // Deleting again is a no-op.
        let response = app(state.clone()).oneshot(form_req("/blog/delete", &delete)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let (status, _) = send(app(state), get_req("/blog/hello-rust")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_with_wrong_password_keeps_post() {
        let (state, _) = test_state().await;
        let publish = format!("password=123&title=Keep&category={}&content=body&action=publish", READING);
        app(state.clone()).oneshot(form_req("/blog/write", &publish)).await.unwrap();
        let id = state.posts.list().unwrap()[0].id.clone();

        let delete = format!("id={}&slug=keep&password=nope", id);
        let (status, body) = send(app(state.clone()), form_req("/blog/delete", &delete)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("비밀번호가 올바르지 않습니다."));
        assert_eq!(state.posts.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_rejection_without_known_slug_keeps_gate_message() {
        let (state, _) = test_state().await;
        let publish = format!("password=123&title=Stay&category={}&content=body&action=publish", READING);
        app(state.clone()).oneshot(form_req("/blog/write", &publish)).await.unwrap();
        let id = state.posts.list().unwrap()[0].id.clone();

        // Stale slug, known id: the post page is shown with the gate message.
        let (status, body) = send(
            app(state.clone()),
            form_req("/blog/delete", &format!("id={}&slug=gone&password=nope", id)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("비밀번호가 올바르지 않습니다."));
        assert!(body.contains("/blog/delete"));

        // Nothing resolves: plain 403, never a not-found page.
        let (status, body) = send(app(state.clone()), form_req("/blog/delete", "id=1&password=nope")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("비밀번호가 올바르지 않습니다."));
        assert_eq!(state.posts.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn crlf_content_renders_code_blocks_and_paragraphs() {
        let (state, _) = test_state().await;
        let publish = format!(
            "password=123&title=Line+endings&category={}&content={}&action=publish",
            READING, "%60%60%60rust%0D%0Alet+x+%3D+1%3B%0D%0A%60%60%60%0D%0A%0D%0Apara+two"
        );
        let response = app(state.clone()).oneshot(form_req("/blog/write", &publish)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(!state.posts.list().unwrap()[0].content.contains('\r'));

        let (status, body) = send(app(state), get_req("/blog/line-endings")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<pre class=\"bg-muted p-4 rounded-lg overflow-x-auto\"><code>let x = 1;"));
        assert!(body.contains("</pre></p><p class=\"mb-4\">para two"));
    }

    #[tokio::test]
    async fn unknown_editor_action_does_not_publish() {
        let (state, _) = test_state().await;
        for action in ["", "&action=pubilsh"] {
            let form = format!("password=123&title=T&category={}&content=body{}", READING, action);
            let (status, body) = send(app(state.clone()), form_req("/blog/write", &form)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("알 수 없는 요청입니다."));
            assert!(body.contains("value=\"T\""));
        }
        assert!(state.posts.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_links_keep_the_search_query() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/blog?q=c%2B%2B%26x%23y")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("q=c%2B%2B%26x%23y\""));
        assert!(!body.contains("q=c++&"));
    }

    #[tokio::test]
    async fn default_thumbnail_is_served() {
        let (state, _) = test_state().await;
        let response = app(state).oneshot(get_req(crate::models::DEFAULT_THUMBNAIL)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    }

    #[tokio::test]
    async fn publish_validation_keeps_input() {
        let (state, _) = test_state().await;
        let (status, body) = send(
            app(state.clone()),
            form_req("/blog/write", "password=123&title=Only+title&content=&action=publish"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("제목, 카테고리, 내용을 모두 입력해주세요."));
        assert!(body.contains("value=\"Only title\""));
        assert!(state.posts.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn draft_is_saved_and_restored_after_unlock() {
        let (state, _) = test_state().await;
        let (status, body) = send(
            app(state.clone()),
            form_req("/blog/write", "password=123&title=Draft+title&content=half+done&action=draft"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("게시글이 임시저장되었습니다!"));

        let (status, body) = send(app(state), form_req("/blog/write/unlock", "password=123")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("임시저장된 글을 불러왔습니다."));
        assert!(body.contains("value=\"Draft title\""));
        assert!(body.contains("half done"));
    }

    #[tokio::test]
    async fn preview_renders_without_saving() {
        let (state, _) = test_state().await;
        let (status, body) = send(
            app(state.clone()),
            form_req("/blog/write", "password=123&title=T&content=%60code%60&action=preview"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<code class=\"bg-muted px-1 py-0.5 rounded text-sm\">code</code>"));
        assert!(state.posts.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_store_is_a_server_error() {
        let (state, store) = test_state().await;
        store.set(POSTS_KEY, "{ not json").unwrap();
        let (status, _) = send(app(state), get_req("/")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn guestbook_sign_and_validate() {
        let (state, _) = test_state().await;

        let (_, body) = send(app(state.clone()), get_req("/guestbook")).await;
        assert!(body.contains("(4개)"));

        let (status, body) = send(
            app(state.clone()),
            form_req("/guestbook", "nickname=rustacean&message=hello+there"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("방명록이 등록되었습니다!"));
        assert!(body.contains("(5개)"));
        assert!(body.contains("RU"));

        let (status, body) = send(app(state.clone()), form_req("/guestbook", "nickname=&message=hi")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("닉네임과 메시지를 모두 입력해주세요."));
        assert_eq!(state.guestbook.entries().await.len(), 5);
    }

    #[tokio::test]
    async fn about_page_renders_profile() {
        let (state, _) = test_state().await;
        let (status, body) = send(app(state), get_req("/about")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("김개발"));
        assert!(body.contains("기술 스택"));
    }
}
