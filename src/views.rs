use std::fmt::Write;

use chrono::{Datelike, NaiveDate};
use htmlescape::encode_minimal;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::content_loader::AboutPage;
use crate::guestbook::{format_created_at, initials, MAX_MESSAGE_CHARS, MAX_NICKNAME_CHARS};
use crate::models::{Category, GuestbookEntry, Post, DEFAULT_THUMBNAIL};
use crate::posts::{Neighbours, PostInput};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

const NAVIGATION_ITEMS: [(&str, &str); 4] = [
    ("/", "홈"),
    ("/about", "소개"),
    ("/blog", "블로그"),
    ("/guestbook", "방명록"),
];

pub const ALL_CATEGORIES_LABEL: &str = "전체";

fn is_active_route(href: &str, path: &str) -> bool {
    if href == "/" {
        path == "/"
    } else {
        path.starts_with(href)
    }
}

fn navigation(path: &str) -> String {
    let mut nav = String::from("<nav class=\"nav\"><a href=\"/\" class=\"brand\">Dev Blog</a><ul>");
    for (href, label) in NAVIGATION_ITEMS {
        let class = if is_active_route(href, path) { "active" } else { "" };
        let _ = write!(nav, "<li><a href=\"{}\" class=\"{}\">{}</a></li>", href, class, label);
    }
    nav.push_str("</ul></nav>");
    nav
}

pub fn render_with_layout(
    layout: &str,
    title: &str,
    path: &str,
    content: &str,
    is_development: bool,
) -> String {
    let mut page = layout
        .replace("{{ title }}", &encode_minimal(title))
        .replace("{{ nav }}", &navigation(path))
        .replace("{{ content }}", content);

    if is_development {
        page = page.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    page
}

/// `2024. 1. 15.`, the Korean short date.
pub fn format_date(date: NaiveDate) -> String {
    format!("{}. {}. {}.", date.year(), date.month(), date.day())
}

fn alert(message: Option<&str>, class: &str) -> String {
    message
        .map(|m| format!("<div class=\"alert {}\" role=\"alert\">{}</div>", class, encode_minimal(m)))
        .unwrap_or_default()
}

fn category_badge(category: Category) -> String {
    format!(
        "<span class=\"badge {}\">{}</span>",
        category.badge_class(),
        category.label()
    )
}

fn post_card(post: &Post) -> String {
    let thumbnail = if post.thumbnail.is_empty() {
        DEFAULT_THUMBNAIL
    } else {
        post.thumbnail.as_str()
    };
    format!(
        concat!(
            "<article class=\"card\">",
            "<a href=\"/blog/{slug}\"><img src=\"{thumb}\" alt=\"{alt}\" class=\"thumbnail\"></a>",
            "<div class=\"card-body\">",
            "<div class=\"meta\">{badge}<span class=\"read-time\">{read}</span></div>",
            "<h3><a href=\"/blog/{slug}\">{title}</a></h3>",
            "<p class=\"excerpt\">{excerpt}</p>",
            "<time datetime=\"{iso}\">{date}</time>",
            "</div></article>"
        ),
        slug = encode_minimal(&post.slug),
        thumb = encode_minimal(thumbnail),
        alt = encode_minimal(&post.title),
        badge = category_badge(post.category),
        read = encode_minimal(&post.read_time),
        title = encode_minimal(&post.title),
        excerpt = encode_minimal(&post.excerpt),
        iso = post.published_at,
        date = format_date(post.published_at),
    )
}

fn card_grid<'a>(posts: impl IntoIterator<Item = &'a Post>) -> String {
    let cards: String = posts.into_iter().map(post_card).collect();
    format!("<div class=\"grid\">{}</div>", cards)
}

pub fn home_page(home_html: &str, recent: &[Post]) -> String {
    format!(
        concat!(
            "<section class=\"hero\">{intro}",
            "<p><a class=\"button\" href=\"/blog\">블로그 둘러보기</a> ",
            "<a class=\"button outline\" href=\"/about\">소개 보기</a></p></section>",
            "<section><div class=\"section-header\"><h2>최근 게시글</h2>",
            "<a href=\"/blog\">전체 보기</a></div>{grid}</section>"
        ),
        intro = home_html,
        grid = card_grid(recent),
    )
}

pub fn about_page(about: &AboutPage) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<section class=\"profile\"><h1>{}</h1><p class=\"role\">{}</p><p>",
        encode_minimal(&about.name),
        encode_minimal(&about.role)
    );
    if let Some(github) = &about.github {
        let _ = write!(html, "<a class=\"button outline\" href=\"{}\" target=\"_blank\">GitHub</a> ", encode_minimal(github));
    }
    if let Some(email) = &about.email {
        let _ = write!(html, "<a class=\"button outline\" href=\"mailto:{}\">Email</a>", encode_minimal(email));
    }
    html.push_str("</p></section>");

    html.push_str("<section class=\"card\"><h2>자기소개</h2>");
    for paragraph in &about.intro {
        let _ = write!(html, "<p>{}</p>", encode_minimal(paragraph));
    }
    html.push_str("</section>");

    html.push_str("<section class=\"card\"><h2>기술 스택</h2>");
    for group in &about.stack {
        let _ = write!(html, "<h3>{}</h3><div class=\"badges\">", encode_minimal(&group.group));
        for item in &group.items {
            let _ = write!(html, "<span class=\"badge\">{}</span>", encode_minimal(item));
        }
        html.push_str("</div>");
    }
    html.push_str("</section>");

    html.push_str("<section class=\"card\"><h2>프로젝트</h2><div class=\"grid\">");
    for project in &about.projects {
        let _ = write!(
            html,
            "<article class=\"card\"><h3>{}</h3><p>{}</p><div class=\"badges\">",
            encode_minimal(&project.title),
            encode_minimal(&project.description)
        );
        for tech in &project.tech {
            let _ = write!(html, "<span class=\"badge\">{}</span>", encode_minimal(tech));
        }
        html.push_str("</div><p>");
        if let Some(github) = &project.github {
            let _ = write!(html, "<a class=\"button outline\" href=\"{}\" target=\"_blank\">GitHub</a> ", encode_minimal(github));
        }
        if let Some(demo) = &project.demo {
            let _ = write!(html, "<a class=\"button outline\" href=\"{}\" target=\"_blank\">Demo</a>", encode_minimal(demo));
        }
        html.push_str("</p></article>");
    }
    html.push_str("</div></section>");
    html
}

/// Filter link keeping the current search. Both values are percent-encoded,
/// so the result is also safe inside an attribute.
fn filter_href(category: &str, query: &str) -> String {
    format!(
        "/blog?category={}&amp;q={}",
        utf8_percent_encode(category, NON_ALPHANUMERIC),
        utf8_percent_encode(query, NON_ALPHANUMERIC)
    )
}

pub fn blog_list_page(posts: &[&Post], selected: Option<Category>, query: &str) -> String {
    let mut filters = String::new();
    let all = std::iter::once((ALL_CATEGORIES_LABEL, selected.is_none()))
        .chain(Category::ALL.into_iter().map(|c| (c.label(), selected == Some(c))));
    for (label, is_selected) in all {
        let class = if is_selected { "button" } else { "button outline" };
        let _ = write!(
            filters,
            "<a class=\"{}\" href=\"{}\">{}</a> ",
            class,
            filter_href(label, query),
            label
        );
    }

    let results = if posts.is_empty() {
        "<p class=\"empty\">검색 결과가 없습니다.</p>".to_string()
    } else {
        card_grid(posts.iter().copied())
    };

    let category_value = selected.map_or(ALL_CATEGORIES_LABEL, Category::label);
    format!(
        concat!(
            "<div class=\"section-header\"><div><h1>블로그</h1>",
            "<p>개발하면서 배운 것들을 기록합니다</p></div>",
            "<a class=\"button\" href=\"/blog/write\">글 작성하기</a></div>",
            "<form method=\"get\" action=\"/blog\" class=\"search\">",
            "<input type=\"hidden\" name=\"category\" value=\"{category}\">",
            "<input type=\"search\" name=\"q\" value=\"{query}\" placeholder=\"검색어를 입력하세요...\">",
            "</form><div class=\"filters\">{filters}</div>{results}"
        ),
        category = encode_minimal(category_value),
        query = encode_minimal(query),
        filters = filters,
        results = results,
    )
}

pub fn post_detail_page(neighbours: &Neighbours<'_>, body_html: &str, deletable: bool, error: Option<&str>) -> String {
    let post = neighbours.current;
    let mut html = format!(
        concat!(
            "<p><a href=\"/blog\">블로그로 돌아가기</a></p>{alert}",
            "<header class=\"post-header\"><img src=\"{thumb}\" alt=\"{alt}\" class=\"hero-image\">",
            "<div class=\"meta\">{badge}<time datetime=\"{iso}\">{date}</time>",
            "<span class=\"read-time\">{read}</span></div>",
            "<h1>{title}</h1></header>",
            "<article class=\"card prose\">{body}</article>"
        ),
        alert = alert(error, "error"),
        thumb = encode_minimal(&post.thumbnail),
        alt = encode_minimal(&post.title),
        badge = category_badge(post.category),
        iso = post.published_at,
        date = format_date(post.published_at),
        read = encode_minimal(&post.read_time),
        title = encode_minimal(&post.title),
        body = body_html,
    );

    if deletable {
        let _ = write!(
            html,
            concat!(
                "<form method=\"post\" action=\"/blog/delete\" class=\"delete-form\">",
                "<input type=\"hidden\" name=\"id\" value=\"{}\">",
                "<input type=\"hidden\" name=\"slug\" value=\"{}\">",
                "<label for=\"password\">관리자 비밀번호</label>",
                "<input id=\"password\" type=\"password\" name=\"password\" placeholder=\"비밀번호를 입력하세요\">",
                "<button type=\"submit\" class=\"button danger\">삭제하기</button></form>"
            ),
            encode_minimal(&post.id),
            encode_minimal(&post.slug)
        );
    }

    html.push_str("<nav class=\"post-nav\"><div>");
    if let Some(prev) = neighbours.previous {
        let _ = write!(
            html,
            "<a class=\"button outline\" href=\"/blog/{}\"><small>이전 글</small> {}</a>",
            encode_minimal(&prev.slug),
            encode_minimal(&prev.title)
        );
    }
    html.push_str("</div><div>");
    if let Some(next) = neighbours.next {
        let _ = write!(
            html,
            "<a class=\"button outline\" href=\"/blog/{}\"><small>다음 글</small> {}</a>",
            encode_minimal(&next.slug),
            encode_minimal(&next.title)
        );
    }
    html.push_str("</div></nav>");
    html
}

pub fn not_found_page(not_found_html: &str, slug: &str) -> String {
    not_found_html.replace("{{slug}}", &encode_minimal(slug))
}

fn password_field(value: &str) -> String {
    format!(
        concat!(
            "<label for=\"password\">관리자 비밀번호</label>",
            "<input id=\"password\" type=\"password\" name=\"password\" value=\"{}\" placeholder=\"비밀번호를 입력하세요\">"
        ),
        encode_minimal(value)
    )
}

pub fn gate_page(error: Option<&str>) -> String {
    format!(
        concat!(
            "<section class=\"card gate\"><h1>글 작성 권한 확인</h1>",
            "<form method=\"post\" action=\"/blog/write/unlock\">{field}{alert}",
            "<p><a class=\"button outline\" href=\"/blog\">취소</a> ",
            "<button type=\"submit\" class=\"button\">확인</button></p></form></section>"
        ),
        field = password_field(""),
        alert = alert(error, "error"),
    )
}

pub struct EditorView<'a> {
    pub input: &'a PostInput,
    pub password: &'a str,
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
    pub preview_html: Option<&'a str>,
}

pub fn editor_page(view: &EditorView<'_>) -> String {
    let input = view.input;
    let mut options = String::from("<option value=\"\">카테고리를 선택하세요</option>");
    for category in Category::ALL {
        let selected = if input.category == Some(category) { " selected" } else { "" };
        let _ = write!(
            options,
            "<option value=\"{label}\"{selected}>{label}</option>",
            label = category.label(),
            selected = selected
        );
    }

    let body_field = match view.preview_html {
        Some(preview) => format!(
            "<div class=\"prose preview\">{}</div><input type=\"hidden\" name=\"content\" value=\"{}\">",
            preview,
            encode_minimal(&input.content)
        ),
        None => format!(
            "<textarea name=\"content\" rows=\"20\" placeholder=\"마크다운 형식으로 내용을 작성하세요...\">{}</textarea>",
            encode_minimal(&input.content)
        ),
    };
    let preview_label = if view.preview_html.is_some() { "편집" } else { "미리보기" };
    let preview_action = if view.preview_html.is_some() { "edit" } else { "preview" };

    format!(
        concat!(
            "<h1>글 작성하기</h1>{error}{notice}",
            "<form method=\"post\" action=\"/blog/write\" class=\"editor\">",
            "<input type=\"hidden\" name=\"password\" value=\"{password}\">",
            "<section class=\"card\"><h2>기본 정보</h2>",
            "<label for=\"title\">제목</label>",
            "<input id=\"title\" name=\"title\" value=\"{title}\" placeholder=\"게시글 제목을 입력하세요\">",
            "<label for=\"category\">카테고리</label>",
            "<select id=\"category\" name=\"category\">{options}</select>",
            "<label for=\"thumbnail\">썸네일</label>",
            "<input id=\"thumbnail\" name=\"thumbnail\" value=\"{thumbnail}\" placeholder=\"{default_thumb}\"></section>",
            "<section class=\"card\"><h2>내용</h2>{body}</section>",
            "<p><button type=\"submit\" name=\"action\" value=\"{preview_action}\" class=\"button outline\">{preview_label}</button> ",
            "<button type=\"submit\" name=\"action\" value=\"draft\" class=\"button outline\">임시저장</button> ",
            "<button type=\"submit\" name=\"action\" value=\"publish\" class=\"button\">발행하기</button></p>",
            "</form>",
            "<aside class=\"card\"><h2>마크다운 가이드</h2><ul>",
            "<li><code># 제목</code> 큰 제목</li><li><code>## 소제목</code> 작은 제목</li>",
            "<li><code>**굵게**</code> 굵은 텍스트</li><li><code>*기울임*</code> 기울임 텍스트</li>",
            "<li><code>`코드`</code> 인라인 코드</li></ul></aside>"
        ),
        error = alert(view.error, "error"),
        notice = alert(view.notice, "notice"),
        password = encode_minimal(view.password),
        title = encode_minimal(&input.title),
        options = options,
        thumbnail = encode_minimal(input.thumbnail.as_deref().unwrap_or("")),
        default_thumb = DEFAULT_THUMBNAIL,
        body = body_field,
        preview_action = preview_action,
        preview_label = preview_label,
    )
}

pub struct GuestbookView<'a> {
    pub entries: &'a [GuestbookEntry],
    pub nickname: &'a str,
    pub message: &'a str,
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
}

pub fn guestbook_page(view: &GuestbookView<'_>) -> String {
    let mut list = String::new();
    for entry in view.entries {
        let _ = write!(
            list,
            concat!(
                "<article class=\"card entry\"><span class=\"avatar\">{initials}</span>",
                "<div><h3>{nickname}</h3><time datetime=\"{iso}\">{date}</time>",
                "<p>{message}</p></div></article>"
            ),
            initials = encode_minimal(&initials(&entry.nickname)),
            nickname = encode_minimal(&entry.nickname),
            iso = entry.created_at.to_rfc3339(),
            date = format_created_at(entry.created_at),
            message = encode_minimal(&entry.message),
        );
    }
    if view.entries.is_empty() {
        list.push_str("<p class=\"empty\">아직 방명록이 없습니다.<br>첫 번째 방명록을 남겨보세요!</p>");
    }

    format!(
        concat!(
            "<header class=\"centered\"><h1>방명록</h1>",
            "<p>블로그를 방문해주신 분들의 소중한 의견을 남겨주세요!</p></header>{error}{notice}",
            "<section class=\"card\"><h2>방명록 작성하기</h2>",
            "<form method=\"post\" action=\"/guestbook\">",
            "<label for=\"nickname\">닉네임</label>",
            "<input id=\"nickname\" name=\"nickname\" maxlength=\"{max_nick}\" value=\"{nickname}\" placeholder=\"닉네임을 입력하세요\">",
            "<label for=\"message\">메시지</label>",
            "<textarea id=\"message\" name=\"message\" rows=\"4\" maxlength=\"{max_msg}\" placeholder=\"방명록을 남겨주세요...\">{message}</textarea>",
            "<button type=\"submit\" class=\"button\">방명록 등록하기</button></form></section>",
            "<section><h2>방명록 목록 <small>({count}개)</small></h2>{list}</section>"
        ),
        error = alert(view.error, "error"),
        notice = alert(view.notice, "notice"),
        max_nick = MAX_NICKNAME_CHARS,
        nickname = encode_minimal(view.nickname),
        max_msg = MAX_MESSAGE_CHARS,
        message = encode_minimal(view.message),
        count = view.entries.len(),
        list = list,
    )
}
