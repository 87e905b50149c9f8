use leptos::html::Canvas;
use leptos::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_timers::callback::Interval;
use strum::IntoEnumIterator;
use web_sys::{Event, MouseEvent, WheelEvent};

use crate::application::{ChartSession, attach_with};
use crate::config::AppConfig;
use crate::domain::chart::SurfaceSize;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::TimeInterval;
use crate::infrastructure::http::HistoryClient;
use crate::infrastructure::rendering::{CanvasRenderer, Tooltip, legend};
use crate::infrastructure::websocket::{ConnectionState, ConnectionStatus, FeedConnection};
use crate::{log_info, log_warn};

const ACTIVITY_LIMIT: usize = 50;
const REPAINT_INTERVAL_MS: u32 = 1000;
const CANDLE_COUNTS: [usize; 5] = [50, 100, 200, 500, 1000];

/// Dashboard root: owns the shared feed and hands it to the widgets below.
#[component]
pub fn App() -> impl IntoView {
    let config = AppConfig::default();
    let feed = FeedConnection::browser(config.feed());
    {
        let feed = feed.clone();
        wasm_bindgen_futures::spawn_local(async move { feed.run().await });
    }

    let (status, set_status) = create_signal(feed.status());
    let (activity, set_activity) = create_signal(Vec::<String>::new());
    let status_watch = feed.watch_status(move |snapshot| set_status.set(snapshot.clone()));
    let activity_feed = feed.subscribe(move |message| {
        if let Some(line) = message.activity_line() {
            set_activity.update(|lines| {
                lines.push(line);
                if lines.len() > ACTIVITY_LIMIT {
                    lines.remove(0);
                }
            });
        }
        Ok(())
    });
    let _subscriptions = store_value((status_watch, activity_feed));

    provide_context(config);
    provide_context(feed.clone());
    on_cleanup(move || feed.shutdown());

    view! {
        <style>
            {r#"
            .dashboard {
                font-family: -apple-system, BlinkMacSystemFont, sans-serif;
                background: #151515;
                min-height: 100vh;
                padding: 20px;
                color: white;
            }
            .toolbar {
                display: flex;
                gap: 12px;
                align-items: center;
                margin-bottom: 10px;
            }
            .badge {
                padding: 3px 8px;
                border-radius: 4px;
                font-size: 12px;
                background: #404040;
            }
            .badge.open { background: #26a69a; }
            .badge.down { background: #ef5350; }
            .chart-wrapper {
                position: relative;
                display: inline-block;
            }
            .tooltip {
                position: absolute;
                background: rgba(0, 0, 0, 0.9);
                padding: 8px 12px;
                border-radius: 6px;
                font-size: 12px;
                font-family: 'Courier New', monospace;
                white-space: pre-line;
                pointer-events: none;
                transform: translate(10px, -100%);
            }
            .legend span { margin-right: 12px; font-size: 12px; }
            .activity {
                background: rgba(0, 0, 0, 0.8);
                border-radius: 10px;
                padding: 15px;
                max-height: 200px;
                overflow-y: auto;
                font-family: 'Courier New', monospace;
                font-size: 11px;
            }
            "#}
        </style>
        <div class="dashboard">
            <StatusBadge status=status />
            <TradingChart />
            <ActivityLog activity=activity />
        </div>
    }
}

#[component]
fn StatusBadge(status: ReadSignal<ConnectionStatus>) -> impl IntoView {
    let feed = expect_context::<FeedConnection>();
    let class = move || match status.get().state {
        ConnectionState::Open => "badge open",
        ConnectionState::Closed => "badge down",
        _ => "badge",
    };
    let text = move || {
        let status = status.get();
        match (&status.state, status.exhausted) {
            (_, true) => format!("Offline after {} attempts", status.attempts),
            (ConnectionState::Reconnecting, _) => format!("Reconnecting ({})", status.attempts + 1),
            (state, _) => state.to_string(),
        }
    };
    let last_error = move || status.get().last_error.map(|e| e.to_string()).unwrap_or_default();

    view! {
        <div class="toolbar">
            <span class=class>{text}</span>
            <span class="badge">{last_error}</span>
            <button
                disabled=move || status.get().is_open()
                on:click=move |_| feed.connect()
            >
                "Reconnect"
            </button>
        </div>
    }
}

/// Candlestick chart bound to the shared feed.
#[component]
fn TradingChart() -> impl IntoView {
    let feed = expect_context::<FeedConnection>();
    let config = expect_context::<AppConfig>();
    let size = SurfaceSize::default();
    let backend = config.backend.clone();

    let session = store_value(Rc::new(RefCell::new(ChartSession::new(config.chart.clone()))));
    let (revision, set_revision) = create_signal(0u64);
    let (timeframe, set_timeframe) = create_signal(config.chart.timeframe);
    let (tooltip, set_tooltip) = create_signal(None::<Tooltip>);
    let drag_origin = Rc::new(Cell::new(None::<f64>));
    let canvas_ref = create_node_ref::<Canvas>();
    let bump = move || set_revision.update(|r| *r += 1);

    let mount = attach_with(session.get_value(), &feed, bump);
    let ticker = Interval::new(REPAINT_INTERVAL_MS, bump);
    on_cleanup(move || {
        drop(ticker);
        drop(mount);
    });

    // History for the selected timeframe; live ticks keep folding in meanwhile.
    create_effect(move |_| {
        let timeframe = timeframe.get();
        let chart = session.get_value();
        chart.borrow_mut().set_timeframe(timeframe);
        let limit = chart.borrow().config().max_candles;
        let client = HistoryClient::new(backend.clone());
        spawn_local(async move {
            match client.fetch_recent(timeframe, limit).await {
                Ok(candles) if chart.borrow().timeframe() == timeframe => {
                    chart.borrow_mut().seed_history(candles);
                    bump();
                }
                Ok(_) => {
                    log_info!(
                        LogComponent::Presentation("TradingChart"),
                        "dropping stale {} history",
                        timeframe
                    );
                }
                Err(e) => {
                    log_warn!(LogComponent::Presentation("TradingChart"), "history: {}", e);
                }
            }
        });
        bump();
    });

    create_effect(move |_| {
        revision.track();
        let Some(canvas) = canvas_ref.get() else {
            return;
        };
        let frame = session.with_value(|chart| chart.borrow().frame(size));
        let painted = CanvasRenderer::from_canvas(&canvas).and_then(|renderer| renderer.render(&frame));
        if let Err(e) = painted {
            log_warn!(LogComponent::Presentation("TradingChart"), "paint failed: {}", e);
        }
    });

    let on_wheel = move |ev: WheelEvent| {
        ev.prevent_default();
        session.with_value(|chart| chart.borrow_mut().wheel(ev.delta_y()));
        bump();
    };
    let on_mouse_down = {
        let drag_origin = drag_origin.clone();
        move |ev: MouseEvent| drag_origin.set(Some(ev.offset_x() as f64))
    };
    let on_mouse_move = {
        let drag_origin = drag_origin.clone();
        move |ev: MouseEvent| {
            let (x, y) = (ev.offset_x() as f64, ev.offset_y() as f64);
            if let Some(origin) = drag_origin.get() {
                drag_origin.set(Some(x));
                session.with_value(|chart| chart.borrow_mut().drag(x - origin, size));
                set_tooltip.set(None);
                bump();
            } else {
                set_tooltip.set(session.with_value(|chart| chart.borrow().hover(x, y, size)));
            }
        }
    };
    let on_mouse_up = {
        let drag_origin = drag_origin.clone();
        move |_: MouseEvent| drag_origin.set(None)
    };
    let on_mouse_leave = move |_: MouseEvent| {
        drag_origin.set(None);
        set_tooltip.set(None);
    };

    let on_count = move |ev: Event| {
        if let Ok(count) = event_target_value(&ev).parse::<usize>() {
            session.with_value(|chart| chart.borrow_mut().set_max_candles(count));
            bump();
        }
    };
    let toggle_play = move |_: MouseEvent| {
        session.with_value(|chart| chart.borrow_mut().toggle_playing());
        bump();
    };
    let reset_view = move |_: MouseEvent| {
        session.with_value(|chart| chart.borrow_mut().reset_view());
        bump();
    };

    let playing = move || {
        revision.track();
        session.with_value(|chart| chart.borrow().is_playing())
    };
    let price = move || {
        revision.track();
        session
            .with_value(|chart| chart.borrow().current_price())
            .map(|p| format!("${p:.2}"))
            .unwrap_or_else(|| "--".to_string())
    };
    let legend_items = move || {
        revision.track();
        session.with_value(|chart| {
            let chart = chart.borrow();
            legend(&chart.overlays(&chart.candles()))
        })
    };

    view! {
        <div class="toolbar">
            <select on:change=move |ev| set_timeframe.set(TimeInterval::from_id(&event_target_value(&ev)))>
                {TimeInterval::iter()
                    .map(|tf| view! {
                        <option value=tf.id().to_string() selected=move || timeframe.get() == tf>
                            {tf.id().to_string()}
                        </option>
                    })
                    .collect_view()}
            </select>
            <select on:change=on_count>
                {CANDLE_COUNTS
                    .iter()
                    .map(|count| view! {
                        <option value=count.to_string() selected=*count == config.chart.max_candles>
                            {count.to_string()}
                        </option>
                    })
                    .collect_view()}
            </select>
            <button on:click=toggle_play>{move || if playing() { "Pause" } else { "Play" }}</button>
            <button on:click=reset_view>"Reset"</button>
            <span class="badge">{price}</span>
        </div>
        <div class="legend">
            {move || legend_items()
                .into_iter()
                .map(|(label, color)| view! { <span style:color=color.to_css()>{label}</span> })
                .collect_view()}
        </div>
        <div class="chart-wrapper">
            <canvas
                node_ref=canvas_ref
                width=size.width.to_string()
                height=size.height.to_string()
                style="cursor: crosshair;"
                on:wheel=on_wheel
                on:mousedown=on_mouse_down
                on:mousemove=on_mouse_move
                on:mouseup=on_mouse_up
                on:mouseleave=on_mouse_leave
            />
            {move || tooltip.get().map(|tip| view! {
                <div class="tooltip" style:left=format!("{}px", tip.x) style:top=format!("{}px", tip.y)>
                    {tip.text}
                </div>
            })}
        </div>
    }
}

#[component]
fn ActivityLog(activity: ReadSignal<Vec<String>>) -> impl IntoView {
    view! {
        <div class="activity">
            {move || activity
                .get()
                .into_iter()
                .map(|line| view! { <div>{line}</div> })
                .collect_view()}
        </div>
    }
}
