//! OpenAPI document and the Swagger UI mount.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::events::list_events,
        handlers::events::get_event,
        handlers::bookings::create_booking,
        handlers::bookings::get_booking,
        handlers::payments::stk_push,
        handlers::payments::payment_status,
        handlers::payments::stk_query,
        handlers::payments::stk_callback,
    ),
    components(schemas(
        handlers::events::EventResponse,
        handlers::events::TicketTypeResponse,
        handlers::bookings::CreateBookingRequest,
        handlers::bookings::BookingResponse,
        handlers::payments::StkPushRequest,
        handlers::payments::StkPushResponseBody,
        handlers::payments::PaymentStatusResponse,
    )),
    tags(
        (name = "events", description = "Event listings and availability"),
        (name = "bookings", description = "Booking lifecycle"),
        (name = "payments", description = "M-Pesa STK push payments")
    ),
    info(
        title = "Tikiti API",
        description = "Event ticketing backend with M-Pesa STK push payments"
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
