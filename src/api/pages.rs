// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server-rendered HTML pages

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::vision::DetectionKind;

const STYLE: &str = "body{font-family:sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem}\
nav a{margin-right:1rem}img{max-width:100%;margin-top:1rem}.notice{color:#a00}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <nav><a href=\"/\">Home</a><a href=\"/ocr\">OCR</a><a href=\"/face\">Face recognition</a></nav>\n\
         {body}\n</body>\n</html>\n",
        title = encode_text(title),
    )
}

pub fn home_page() -> String {
    layout(
        "Vision annotator",
        "<h1>Welcome</h1>\n\
         <p>Upload an image and see it annotated.</p>\n\
         <ul>\n<li><a href=\"/ocr\">OCR</a>: text regions and the recognized text</li>\n\
         <li><a href=\"/face\">Face recognition</a>: faces and facial landmarks</li>\n</ul>",
    )
}

fn prompt(kind: DetectionKind) -> &'static str {
    match kind {
        DetectionKind::Text => "Upload a photo to see OCR results.",
        DetectionKind::Face => "Upload a photo to see face recognition results.",
    }
}

fn heading(kind: DetectionKind) -> &'static str {
    match kind {
        DetectionKind::Text => "OCR",
        DetectionKind::Face => "Face recognition",
    }
}

/// Upload form for `kind`, with the annotated result when there is one
pub fn upload_page(kind: DetectionKind, image_url: Option<&str>, notice: Option<&str>) -> String {
    let mut body = format!(
        "<h1>{heading}</h1>\n<p>{prompt}</p>\n\
         <form method=\"post\" action=\"/{route}\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"image/*\">\n\
         <button type=\"submit\">Upload</button>\n</form>",
        heading = heading(kind),
        prompt = prompt(kind),
        route = route(kind),
    );

    if let Some(notice) = notice {
        body.push_str(&format!("\n<p class=\"notice\">{}</p>", encode_text(notice)));
    }

    if let Some(url) = image_url {
        body.push_str(&format!(
            "\n<img src=\"{url}\" alt=\"{heading} result\">",
            url = encode_double_quoted_attribute(url),
            heading = heading(kind),
        ));
    }

    layout(heading(kind), &body)
}

/// Path segment of the page for `kind`
pub fn route(kind: DetectionKind) -> &'static str {
    match kind {
        DetectionKind::Text => "ocr",
        DetectionKind::Face => "face",
    }
}
