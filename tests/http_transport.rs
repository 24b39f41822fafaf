use invoice_fetcher::models::SessionCookie;
use invoice_fetcher::{HttpTransport, ScrapeError, Transport};
use reqwest::Url;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> HttpTransport {
    HttpTransport::with_settings("Mozilla/5.0 (test)", Duration::from_secs(5)).unwrap()
}

fn at(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
}

#[tokio::test]
async fn test_cookies_persist_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ap/signin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session-id=123-456; Path=/")
                .set_body_string("<form></form>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("cookie", "session-id=123-456"))
        .respond_with(ResponseTemplate::new(200).set_body_string("orders"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport();
    transport.get(&at(&server, "/ap/signin")).await.unwrap();

    let cookies = transport.session_cookies(&at(&server, "/")).await.unwrap();
    assert_eq!(cookies, vec![SessionCookie::new("session-id", "123-456")]);

    let page = transport.get(&at(&server, "/orders")).await.unwrap();
    assert_eq!(page.text(), "orders");
}

#[tokio::test]
async fn test_redirect_followed_and_final_url_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gp/your-account/order-history"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/ap/signin?return=orders"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ap/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sign in"))
        .mount(&server)
        .await;

    let page = transport()
        .get(&at(&server, "/gp/your-account/order-history"))
        .await
        .unwrap();
    assert_eq!(page.url.path(), "/ap/signin");
    assert!(page.is_success());
}

#[tokio::test]
async fn test_form_post_is_urlencoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ap/signin"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("appActionToken=a%2Bb%3D&email=sam%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string("next"))
        .expect(1)
        .mount(&server)
        .await;

    let fields = vec![
        ("appActionToken".to_string(), "a+b=".to_string()),
        ("email".to_string(), "sam@example.com".to_string()),
    ];
    let page = transport().post_form(&at(&server, "/ap/signin"), &fields).await.unwrap();
    assert_eq!(page.text(), "next");
}

#[tokio::test]
async fn test_pdf_detection_and_bad_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoice.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = transport();
    let page = transport.get(&at(&server, "/invoice.pdf")).await.unwrap();
    assert!(page.is_pdf());
    assert_eq!(page.body, b"%PDF-1.4");

    let err = transport
        .get(&at(&server, "/gone"))
        .await
        .unwrap()
        .ensure_success()
        .unwrap_err();
    assert!(matches!(err, ScrapeError::BadStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_imported_cookies_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("cookie", "at-main=Atza|x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport();
    transport.import_cookies(&[SessionCookie::new("at-main", "Atza|x")], &at(&server, "/"));
    let page = transport.get(&at(&server, "/orders")).await.unwrap();
    assert_eq!(page.text(), "ok");
}
