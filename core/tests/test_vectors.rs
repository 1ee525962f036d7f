//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, the expected XML-RPC call, a simulated
//! response, and the expected parse result. Requests are compared after
//! decoding the call back into values, so member order and whitespace in the
//! XML never cause false negatives.

use oerp_core::{
    domain_from_json, ConnectOptions, Context, HttpRequest, HttpResponse, ObjectClient, OerpError, Record,
    SearchParams, SearchResult, Session, Value, Values,
};
use oerp_xmlrpc::decode_call;

fn client() -> ObjectClient {
    let options = ConnectOptions::new("localhost", 8069, "demo", "admin", "admin");
    ObjectClient::new(Session::new(options, 1).unwrap())
}

fn load(raw: &str) -> Vec<serde_json::Value> {
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn check_request(name: &str, req: &HttpRequest, expected: &serde_json::Value) {
    assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
    assert_eq!(
        req.headers,
        vec![("content-type".to_string(), "text/xml".to_string())],
        "{name}: headers"
    );
    let call = decode_call(&req.body).unwrap();
    assert_eq!(call.method_name, expected["method_name"].as_str().unwrap(), "{name}: method");
    let params = serde_json::Value::from(Value::Array(call.params));
    assert_eq!(params, expected["params"], "{name}: params");
}

fn response(case: &serde_json::Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

fn check_error(name: &str, err: OerpError, expected: &str) {
    let matched = match expected {
        "AuthenticationFailed" => matches!(err, OerpError::AuthenticationFailed { .. }),
        "Fault" => matches!(err, OerpError::Fault { .. }),
        "Http" => matches!(err, OerpError::Http { .. }),
        "UnexpectedResponse" => matches!(err, OerpError::UnexpectedResponse { .. }),
        other => panic!("{name}: unknown expected_error: {other}"),
    };
    assert!(matched, "{name}: expected {expected}, got {err:?}");
}

fn values(json: &serde_json::Value) -> Values {
    match Value::from(json.clone()) {
        Value::Struct(members) => members,
        other => panic!("values must be an object, got {other:?}"),
    }
}

/// The optional `context` input; absent means no context.
fn context(input: &serde_json::Value) -> Option<Context> {
    input.get("context").map(values)
}

fn ids(json: &serde_json::Value) -> Vec<i32> {
    serde_json::from_value(json.clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[test]
fn login_test_vectors() {
    for case in load(include_str!("../../test-vectors/login.json")) {
        let name = case["name"].as_str().unwrap();
        let options: ConnectOptions = serde_json::from_value(case["input"].clone()).unwrap();

        let req = ObjectClient::build_login(&options).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = ObjectClient::parse_login(options, response(&case));
        match case.get("expected_error") {
            Some(expected) => check_error(name, result.unwrap_err(), expected.as_str().unwrap()),
            None => {
                let client = result.unwrap();
                assert_eq!(
                    client.session().uid() as i64,
                    case["expected_uid"].as_i64().unwrap(),
                    "{name}: uid"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn create_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/create.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];

        let req = c.build_create(
            input["model"].as_str().unwrap(),
            &values(&input["values"]),
            context(input).as_ref(),
        );
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_create(response(&case));
        match case.get("expected_error") {
            Some(expected) => check_error(name, result.unwrap_err(), expected.as_str().unwrap()),
            None => assert_eq!(
                result.unwrap() as i64,
                case["expected_result"].as_i64().unwrap(),
                "{name}: id"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/search.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];

        let mut params = SearchParams::new(domain_from_json(input["domain"].clone()).unwrap())
            .offset(input["offset"].as_u64().unwrap() as u32)
            .limit(input["limit"].as_u64().unwrap() as u32)
            .reverse(input["reverse"].as_bool().unwrap())
            .count(input["count"].as_bool().unwrap());
        if let Some(order) = input["order"].as_str() {
            params = params.order(order);
        }

        let req = c.build_search(input["model"].as_str().unwrap(), &params);
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_search(&params, response(&case)).unwrap();
        let expected = &case["expected_result"];
        let wanted = match expected.get("count") {
            Some(n) => SearchResult::Count(n.as_u64().unwrap() as usize),
            None => SearchResult::Ids(ids(&expected["ids"])),
        };
        assert_eq!(result, wanted, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[test]
fn read_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/read.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let wanted_ids = ids(&input["ids"]);
        let fields: Vec<String> = serde_json::from_value(input["fields"].clone()).unwrap();
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();

        let req = c.build_read(input["model"].as_str().unwrap(), &wanted_ids, &fields);
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_read(&wanted_ids, response(&case));
        match case.get("expected_error") {
            Some(expected) => check_error(name, result.unwrap_err(), expected.as_str().unwrap()),
            None => {
                let records: Vec<serde_json::Value> = result
                    .unwrap()
                    .into_iter()
                    .map(|r: Record| serde_json::Value::from(Value::Struct(r.into_inner())))
                    .collect();
                assert_eq!(
                    serde_json::Value::Array(records),
                    case["expected_result"],
                    "{name}: parsed result"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Write / Unlink
// ---------------------------------------------------------------------------

#[test]
fn write_and_unlink_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/write.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let model = input["model"].as_str().unwrap();
        let record_ids = ids(&input["ids"]);

        let (req, result) = match input["method"].as_str().unwrap() {
            "write" => {
                let req = c.build_write(model, &record_ids, &values(&input["values"]), context(input).as_ref());
                (req, c.parse_write(response(&case)))
            }
            "unlink" => (c.build_unlink(model, &record_ids), c.parse_unlink(response(&case))),
            other => panic!("{name}: unknown method {other}"),
        };
        check_request(name, &req, &case["expected_request"]);

        match case.get("expected_error") {
            Some(expected) => check_error(name, result.unwrap_err(), expected.as_str().unwrap()),
            None => assert_eq!(
                result.unwrap(),
                case["expected_result"].as_bool().unwrap(),
                "{name}: parsed result"
            ),
        }
    }
}
