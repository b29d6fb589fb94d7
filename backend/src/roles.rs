use actix_web::web;

pub mod helpers;
pub mod models;
mod parent;
mod student;
mod teacher;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Teacher routes
        .service(teacher::list_teachers)
        .service(teacher::create_teacher)
        .service(teacher::get_teacher)
        .service(teacher::update_teacher)
        .service(teacher::delete_teacher)
        // Student routes
        .service(student::list_students)
        .service(student::create_student)
        .service(student::get_student)
        .service(student::update_student)
        .service(student::delete_student)
        // Parent routes
        .service(parent::list_parent_types)
        .service(parent::list_parents)
        .service(parent::create_parent)
        .service(parent::get_parent)
        .service(parent::update_parent)
        .service(parent::delete_parent);
}
