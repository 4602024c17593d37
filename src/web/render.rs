use std::fmt::Write;

use crate::models::{Playlist, PlaylistVideo};

pub enum Notice {
    Added(String),
    InvalidName(String),
}

pub struct PageView<'a> {
    pub subreddit_name: Option<&'a str>,
    pub playlist: Option<&'a Playlist>,
    pub videos: &'a [PlaylistVideo],
    pub tracked: &'a [String],
    pub notice: Option<Notice>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn subreddit_href(name: &str) -> String {
    format!("/{}", urlencoding::encode(name))
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::new();
    let heading = match view.subreddit_name {
        Some(name) => format!("/r/{}", escape_html(name)),
        None => "Reddit playlists".to_string(),
    };

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{heading}</title>\n</head>\n<body>\n<h1>{heading}</h1>\n"
    );

    match &view.notice {
        Some(Notice::Added(name)) => {
            let _ = writeln!(
                html,
                "<p class=\"notice\">{} was added to the list of subreddit playlists!</p>",
                escape_html(name)
            );
        }
        Some(Notice::InvalidName(name)) => {
            let _ = writeln!(
                html,
                "<p class=\"notice error\">{} is not a valid subreddit name.</p>",
                escape_html(name)
            );
        }
        None => {}
    }

    if let Some(name) = view.subreddit_name {
        match view.playlist {
            Some(playlist) => render_playlist(&mut html, playlist, view.videos),
            None => {
                let _ = writeln!(
                    html,
                    "<p>No playlist for /r/{} yet today.</p>",
                    escape_html(name)
                );
            }
        }
    }

    html.push_str("<h2>Tracked subreddits</h2>\n<ul class=\"subreddits\">\n");
    for name in view.tracked {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">/r/{}</a></li>",
            escape_html(&subreddit_href(name)),
            escape_html(name)
        );
    }
    html.push_str("</ul>\n");

    html.push_str(
        "<form method=\"post\" action=\"/add\">\n\
         <label>Add a subreddit: <input type=\"text\" name=\"subreddit_name\" required></label>\n\
         <button type=\"submit\">Add</button>\n\
         </form>\n</body>\n</html>\n",
    );
    html
}

fn render_playlist(html: &mut String, playlist: &Playlist, videos: &[PlaylistVideo]) {
    let embed = format!(
        "https://www.youtube.com/embed/videoseries?list={}",
        urlencoding::encode(&playlist.playlist_id)
    );
    let _ = write!(
        html,
        "<p><a class=\"playlist\" href=\"{}\">Today's playlist</a> (created {})</p>\n\
         <iframe width=\"560\" height=\"315\" src=\"{}\" allowfullscreen></iframe>\n",
        escape_html(&playlist.url()),
        playlist.date_created.format("%Y-%m-%d %H:%M"),
        escape_html(&embed)
    );

    if videos.is_empty() {
        return;
    }
    html.push_str("<ol class=\"videos\">\n");
    for video in videos {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}</a></li>",
            escape_html(&video.source_url),
            escape_html(&video.video_id)
        );
    }
    html.push_str("</ol>\n");
}
