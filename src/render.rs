//! Server rendered HTML for the week grid and the slot modal.
//!
//! The page uses htmx: grid cells load the modal into `#modal`, forms post
//! back and follow the `HX-Redirect` header on success.

use crate::booking_service::{SlotDetail, WeekView};
use chrono::NaiveDate;
use std::fmt::Write;

pub const TITLE: &str = "Beauty Salon Appointments";

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn week_link(view: &WeekView, week_start: NaiveDate) -> String {
    let mut link = format!("/?week_start={}", iso(week_start));
    if let Some(name) = &view.selected_employee {
        let _ = write!(link, "&amp;emp={}", escape(&urlencoding::encode(name)));
    }
    link
}

/// Full page: header with week navigation, employee filter and the grid.
pub fn page(view: &WeekView) -> String {
    let navigation = &view.navigation;
    let mut employee_options = String::from(r#"<option value="all">All staff</option>"#);
    for employee in &view.all_employees {
        let selected = if view.selected_employee.as_deref() == Some(employee.name.as_str()) {
            " selected"
        } else {
            ""
        };
        let name = escape(&employee.name);
        let _ = write!(employee_options, r#"<option value="{name}"{selected}>{name}</option>"#);
    }

    format!(
        r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <link rel="manifest" href="/manifest.webmanifest" />
  <meta name="theme-color" content="#e11d48" />
  <script src="https://cdn.tailwindcss.com"></script>
  <script src="https://unpkg.com/htmx.org@1.9.12"></script>
</head>
<body class="bg-white text-gray-900 min-h-screen">
  <header class="bg-gradient-to-r from-rose-500 via-fuchsia-500 to-violet-500 text-white">
    <div class="max-w-6xl mx-auto px-4 py-5 flex flex-col sm:flex-row sm:items-end sm:justify-between gap-3">
      <div>
        <h1 class="text-2xl sm:text-3xl font-extrabold tracking-tight">{title}</h1>
        <p class="text-xs sm:text-sm text-white/90 mt-1">Weekly view &bull; {booked} booked &bull; booked slots are red</p>
      </div>
      <nav class="flex items-center gap-2">
        <a class="px-3 py-2 rounded-xl bg-white/15 hover:bg-white/25" href="{previous}">&#9664; Previous</a>
        <a class="px-3 py-2 rounded-xl bg-white text-rose-700 font-semibold" href="{this_week}">Today</a>
        <a class="px-3 py-2 rounded-xl bg-white/15 hover:bg-white/25" href="{next}">Next &#9654;</a>
        <span class="px-3 py-2 rounded-xl bg-white/15">{shown}</span>
      </nav>
    </div>
  </header>
  <main class="max-w-6xl mx-auto px-4 py-6 space-y-4">
    <form class="flex items-center gap-2" hx-get="/calendar_partial" hx-target="#calendar" hx-trigger="change">
      <input type="hidden" name="week_start" value="{week_start}" />
      <label class="text-sm font-semibold" for="emp">Staff</label>
      <select id="emp" name="emp" class="border rounded-lg px-2 py-1">{employee_options}</select>
    </form>
    <div id="calendar">{calendar}</div>
  </main>
  <div id="modal"></div>
  <script>
    document.body.addEventListener("htmx:beforeSwap", (event) => {{
      if (event.detail.xhr.status >= 400) {{
        event.detail.shouldSwap = true;
        event.detail.isError = false;
      }}
    }});
    if ("serviceWorker" in navigator) {{
      navigator.serviceWorker.register("/sw.js").catch(() => {{}});
    }}
  </script>
</body>
</html>
"##,
        title = TITLE,
        previous = week_link(view, navigation.previous),
        this_week = week_link(view, navigation.this_week),
        next = week_link(view, navigation.next),
        shown = navigation.current.format("%d.%m.%Y"),
        booked = view.booked_count(),
        week_start = iso(navigation.current),
        employee_options = employee_options,
        calendar = calendar(view),
    )
}

/// The grid alone, one card per day with a slot x employee table.
pub fn calendar(view: &WeekView) -> String {
    let mut html = String::from(r#"<div class="grid gap-4 md:grid-cols-2 xl:grid-cols-3">"#);
    for day in &view.days {
        let _ = write!(
            html,
            r#"<section class="rounded-2xl shadow ring-1 ring-black/5 p-3"><h2 class="font-semibold mb-2">{} {}</h2>"#,
            day.date.format("%A"),
            day.date.format("%d.%m")
        );
        if day.slots.is_empty() {
            html.push_str(r#"<p class="text-sm text-gray-500">Closed</p></section>"#);
            continue;
        }

        html.push_str(r#"<table class="w-full text-xs"><thead><tr><th></th>"#);
        for employee in &view.employees {
            let _ = write!(html, r#"<th class="px-1">{}</th>"#, escape(&employee.name));
        }
        html.push_str("</tr></thead><tbody>");
        for slot in &day.slots {
            let _ = write!(html, r#"<tr><td class="pr-1 font-mono">{}</td>"#, slot.label);
            for employee in &view.employees {
                let target = format!(
                    "/slot?date={}&amp;time={}&amp;employee_id={}",
                    iso(day.date),
                    slot.label,
                    employee.id
                );
                match view.appointment_at(employee.id, slot) {
                    Some(appointment) => {
                        let _ = write!(
                            html,
                            r##"<td class="p-0.5"><button class="w-full rounded bg-red-500 text-white truncate px-1" hx-get="{target}" hx-target="#modal">{}</button></td>"##,
                            escape(&appointment.customer_name)
                        );
                    }
                    None => {
                        let _ = write!(
                            html,
                            r##"<td class="p-0.5"><button class="w-full rounded border border-gray-200 hover:bg-rose-50 px-1" hx-get="{target}" hx-target="#modal">&nbsp;</button></td>"##
                        );
                    }
                }
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table></section>");
    }
    html.push_str("</div>");
    html
}

fn modal(title: &str, body: &str) -> String {
    format!(
        r#"<div class="fixed inset-0 bg-black/40 flex items-center justify-center p-4" onclick="if (event.target === this) this.remove()">
  <div class="bg-white rounded-2xl shadow-xl w-full max-w-md p-5 space-y-3">
    <h3 class="text-lg font-semibold">{title}</h3>
    {body}
    <p id="modal-error" class="text-sm text-red-600"></p>
  </div>
</div>"#
    )
}

/// Detail of a booked slot, the booking form for a free one, or a notice
/// when the time cannot be booked.
pub fn slot_modal(detail: &SlotDetail, services: &[String]) -> String {
    let title = format!(
        "{} &bull; {} {}",
        escape(&detail.employee.name),
        detail.date.format("%d.%m.%Y"),
        detail.time
    );

    if let Some(appointment) = &detail.appointment {
        let phone = appointment
            .phone
            .as_deref()
            .map(escape)
            .unwrap_or_else(|| "&ndash;".into());
        let body = format!(
            r##"<dl class="text-sm grid grid-cols-3 gap-1">
      <dt class="font-semibold">Customer</dt><dd class="col-span-2">{customer}</dd>
      <dt class="font-semibold">Phone</dt><dd class="col-span-2">{phone}</dd>
      <dt class="font-semibold">Service</dt><dd class="col-span-2">{service}</dd>
    </dl>
    <form hx-post="/appointments/{id}/delete" hx-target="#modal-error" hx-confirm="Delete this appointment?">
      <button class="px-3 py-2 rounded-xl bg-red-600 text-white">Delete</button>
    </form>"##,
            customer = escape(&appointment.customer_name),
            phone = phone,
            service = escape(&appointment.service),
            id = appointment.id,
        );
        return modal(&title, &body);
    }

    if !detail.bookable {
        return modal(&title, r#"<p class="text-sm">This time cannot be booked.</p>"#);
    }

    let mut service_options = String::new();
    for service in services {
        let _ = write!(service_options, r#"<option value="{}"></option>"#, escape(service));
    }
    let body = format!(
        r##"<form class="space-y-2" hx-post="/appointments" hx-target="#modal-error">
      <input type="hidden" name="employee_id" value="{employee_id}" />
      <input type="hidden" name="date" value="{date}" />
      <input type="hidden" name="time" value="{time}" />
      <input class="w-full border rounded-lg px-2 py-1" name="customer_name" placeholder="Customer name" required />
      <input class="w-full border rounded-lg px-2 py-1" name="phone" placeholder="Phone (optional)" type="tel" />
      <input class="w-full border rounded-lg px-2 py-1" name="service" placeholder="Service" list="services" required />
      <datalist id="services">{service_options}</datalist>
      <button class="px-3 py-2 rounded-xl bg-rose-600 text-white">Book</button>
    </form>"##,
        employee_id = detail.employee.id,
        date = iso(detail.date),
        time = detail.time,
        service_options = service_options,
    );
    modal(&title, &body)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::AppointmentBackend, booking_service::BookingService, configuration::BusinessHours,
        local_appointments::LocalAppointments,
    };
    use chrono_tz::Europe::Istanbul;

    fn week(filter: Option<&str>) -> WeekView {
        let store = LocalAppointments::default();
        store
            .ensure_employees(&["İrem X".to_string(), "Merve".to_string()])
            .unwrap();
        BookingService::new(store, BusinessHours::default(), Istanbul, vec![])
            .week_view(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), filter)
            .unwrap()
    }

    #[test]
    fn test_week_links_keep_encoded_employee_filter() {
        let html = page(&week(Some("İrem X")));
        assert!(html.contains("/?week_start=2025-03-10&amp;emp=%C4%B0rem%20X"));
        assert!(html.contains("/?week_start=2025-02-24&amp;emp=%C4%B0rem%20X"));
        assert!(html.contains("0 booked"));
    }

    #[test]
    fn test_week_links_without_filter() {
        let html = page(&week(None));
        assert!(html.contains(r#"href="/?week_start=2025-03-10""#));
        assert!(!html.contains("emp="));
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<b>"Ayse" & 'Fatma'</b>"#),
            "&lt;b&gt;&quot;Ayse&quot; &amp; &#39;Fatma&#39;&lt;/b&gt;"
        );
    }
}
